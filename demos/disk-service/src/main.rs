#![allow(missing_docs)]
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use tracing::{info, warn};

use disk_service::{ServiceConfig, run};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let args = ServeArgs::from_env().context("reading command line arguments")?;
    run(args.addr(), args.service_config()).await?;

    info!("disk service stopped");
    Ok(())
}

/// `disk-service [--host IP] [--port PORT] [--polls N]`
#[derive(Debug)]
struct ServeArgs {
    host: Option<IpAddr>,
    port: Option<u16>,
    polls_before_done: Option<usize>,
}

impl ServeArgs {
    fn from_env() -> anyhow::Result<Self> {
        let mut pargs = pico_args::Arguments::from_env();
        let args = Self {
            host: pargs
                .opt_value_from_str(["-h", "--host"])
                .context("invalid --host")?,
            port: pargs
                .opt_value_from_str(["-p", "--port"])
                .context("invalid --port")?,
            polls_before_done: pargs
                .opt_value_from_str("--polls")
                .context("invalid --polls")?,
        };

        let ignored = pargs.finish();
        if !ignored.is_empty() {
            warn!(?ignored, "ignoring unknown arguments");
        }
        Ok(args)
    }

    fn addr(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        SocketAddr::new(host, self.port.unwrap_or(DEFAULT_PORT))
    }

    fn service_config(&self) -> ServiceConfig {
        self.polls_before_done
            .map_or_else(ServiceConfig::default, |polls| {
                ServiceConfig::default().with_polls_before_done(polls)
            })
    }
}
