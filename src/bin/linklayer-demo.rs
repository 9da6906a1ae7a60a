use std::env;
use std::str::FromStr;
use std::time::Duration;

use linklayer::{LinkLayerBuilder, Role};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let device = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let role = args
        .next()
        .map(|s| Role::from_str(&s))
        .transpose()?
        .unwrap_or(Role::Transmitter);
    let baud = args.next().map(|s| s.parse::<u32>()).transpose()?.unwrap_or(9600);

    match role {
        Role::Transmitter => {
            let mut link = LinkLayerBuilder::new()
                .transmitter(&device)
                .baud(baud)
                .timeout(Duration::from_secs(3))
                .build()?;
            link.write(b"hello from the link layer demo")?;
            link.close(true)?;
        }
        Role::Receiver => {
            let mut link = LinkLayerBuilder::new()
                .receiver(&device)
                .baud(baud)
                .timeout(Duration::from_secs(3))
                .build()?;
            let mut buf = [0u8; linklayer::protocol::MAX_PAYLOAD_SIZE];
            loop {
                let n = link.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                println!("{:?}", &buf[..n]);
            }
            link.close(true)?;
        }
    }

    Ok(())
}
