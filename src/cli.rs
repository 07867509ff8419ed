use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use getopts::Options;
use tokio::time::Duration;

pub struct Args {
    pub address: SocketAddr,
    pub window_days: u32,
    pub refresh_every: Duration,
    pub concurrency: usize,
    pub group_size: usize,
    pub detail_wait: Duration,
    pub max_chars: usize,
    pub chrome_path: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

fn opts() -> Options {
    let mut opts = Options::new();
    opts.optflag(
        "h",
        "help",
        concat!("Print the help output of ", env!("CARGO_PKG_NAME")),
    );
    opts.optopt(
        "a",
        "address",
        "Socket address (IP and port) to listen on [Default: 127.0.0.1:8080, or 0.0.0.0:$PORT]",
        "SOCKET_ADDRESS",
    );
    opts.optopt(
        "d",
        "days",
        "Rolling window of dates kept warm, starting today [Default: 7]",
        "DAYS",
    );
    opts.optopt(
        "r",
        "refresh",
        "Seconds between background window refreshes [Default: 600]",
        "SECONDS",
    );
    opts.optopt(
        "j",
        "concurrency",
        "Detail pages fetched in parallel per date [Default: 1]",
        "COUNT",
    );
    opts.optopt(
        "g",
        "group-size",
        "Events per reply chunk [Default: 1]",
        "COUNT",
    );
    opts.optopt(
        "w",
        "detail-wait",
        "Seconds a detail page gets to render its heading [Default: 10]",
        "SECONDS",
    );
    opts.optopt(
        "m",
        "max-chars",
        "Character cap for full digest bodies, 0 to disable [Default: 3000]",
        "CHARS",
    );
    opts.optopt(
        "c",
        "chrome",
        "Headless browser executable [Default: $CHROME or well-known locations]",
        "PATH",
    );
    opts.optopt(
        "",
        "cache-dir",
        "Directory for per-date schedule files [Default: disabled]",
        "DIR",
    );
    opts
}

pub fn parse(args: Vec<String>) -> Args {
    let opts = opts();

    let matches = match opts.parse(args) {
        Ok(matches) => matches,
        Err(fail) => {
            eprintln!("{fail}");
            process::exit(1);
        }
    };

    if matches.opt_present("help") {
        println!("{}", opts.usage(&opts.short_usage(env!("CARGO_PKG_NAME"))));
        process::exit(0);
    }

    let default_address = env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .map_or_else(
            || SocketAddr::from(([127, 0, 0, 1], 8080)),
            |port| SocketAddr::from(([0, 0, 0, 0], port)),
        );

    let address = match matches.opt_get_default("address", default_address) {
        Ok(address) => address,
        Err(err) => {
            eprintln!("Provided value for option 'address' is invalid: {err}");
            process::exit(1);
        }
    };

    let window_days = match matches.opt_get_default("days", 7u32) {
        Ok(days) => days.max(1),
        Err(err) => {
            eprintln!("Provided value for option 'days' is invalid: {err}");
            process::exit(1);
        }
    };

    let refresh_every = match matches.opt_get_default("refresh", 600) {
        Ok(secs) => Duration::from_secs(secs.max(1)),
        Err(err) => {
            eprintln!("Provided value for option 'refresh' is invalid: {err}");
            process::exit(1);
        }
    };

    let concurrency = match matches.opt_get_default("concurrency", 1usize) {
        Ok(count) => count.max(1),
        Err(err) => {
            eprintln!("Provided value for option 'concurrency' is invalid: {err}");
            process::exit(1);
        }
    };

    let group_size = match matches.opt_get_default("group-size", 1usize) {
        Ok(count) => count.max(1),
        Err(err) => {
            eprintln!("Provided value for option 'group-size' is invalid: {err}");
            process::exit(1);
        }
    };

    let detail_wait = match matches.opt_get_default("detail-wait", 10) {
        Ok(secs) => Duration::from_secs(secs),
        Err(err) => {
            eprintln!("Provided value for option 'detail-wait' is invalid: {err}");
            process::exit(1);
        }
    };

    let max_chars = match matches.opt_get_default("max-chars", 3000usize) {
        Ok(chars) => chars,
        Err(err) => {
            eprintln!("Provided value for option 'max-chars' is invalid: {err}");
            process::exit(1);
        }
    };

    let chrome_path = matches.opt_str("chrome").map(PathBuf::from);
    let cache_dir = matches.opt_str("cache-dir").map(PathBuf::from);

    Args {
        address,
        window_days,
        refresh_every,
        concurrency,
        group_size,
        detail_wait,
        max_chars,
        chrome_path,
        cache_dir,
    }
}
