use std::time::Duration;

use clap::Parser;
use httpchain::{HttpClient, Method, TransferResult};
use log::LevelFilter;

/// httpchain - make a single HTTP request or hold a WebSocket session
#[derive(Parser, Debug)]
#[command(name = "httpchain")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target URL (http, https, ws or wss)
    url: String,

    /// Request method
    #[arg(short = 'X', long = "request")]
    method: Option<Method>,

    /// Raw "Key: Value" header line; may be repeated
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body; switches GET to POST
    #[arg(short = 'd', long)]
    data: Option<String>,

    /// URL parameter appended to the query string; may be repeated
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Send an "Authorization: Bearer" header
    #[arg(long)]
    bearer: Option<String>,

    /// Send a browser User-Agent and "Accept: */*"
    #[arg(long)]
    default_headers: bool,

    /// Load and save cookies in this Netscape-format file
    #[arg(short = 'c', long)]
    cookie_jar: Option<String>,

    /// Trace the transfer (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECS", value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Upgrade to a WebSocket and print every received message
    #[arg(long)]
    stream: bool,

    /// Message to send once per received reply; the stream closes after the last
    #[arg(long = "send", value_name = "MESSAGE", requires = "stream")]
    send: Vec<String>,

    /// Print the whole result as JSON
    #[arg(long)]
    json: bool,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("invalid timeout '{}': {}", s, e))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("timeout must be positive, got '{}'", s));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn log_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_filter(verbose));
    builder.parse_env("HTTPCHAIN_LOG");
    let _ = builder.try_init();
}

fn run(args: &Args) -> TransferResult {
    let mut client = HttpClient::build();
    client.set_url(&args.url);

    if let Some(method) = args.method {
        client.set_method(method);
    }
    if args.default_headers {
        client.set_default_headers();
    }
    if let Some(token) = &args.bearer {
        client.set_authority_header(token);
    }
    for header in &args.headers {
        client.set_header(header);
    }
    for (key, value) in &args.params {
        client.add_url_param(key, value);
    }
    if let Some(data) = &args.data {
        client.set_raw_body(data.as_bytes());
    }
    if let Some(path) = &args.cookie_jar {
        client.set_cookie_filepath(path);
    }
    if let Some(timeout) = args.timeout {
        client.set_timeout(timeout);
    }
    client.set_verbosity(u64::from(args.verbose));

    if args.stream {
        let close_when_done = !args.send.is_empty();
        let mut pending = args.send.clone().into_iter();

        if let Some(first) = pending.next() {
            client.stream_write(first);
        }

        client.stream().set_on_recv_callback(move |buffer| {
            println!("{}", String::from_utf8_lossy(&buffer.take()));

            match pending.next() {
                Some(next) => buffer.stream_write(next),
                None if close_when_done => buffer.stream_close(),
                None => {}
            }
        });
    }

    client.execute()
}

fn report(args: &Args, result: &TransferResult) -> i32 {
    if args.json {
        match serde_json::to_string_pretty(result) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: could not serialize result: {}", e),
        }
    } else if result.is_ok() {
        print!("{}", result.output);
    } else {
        eprintln!("Error: {}", result.code);
        if !result.output.is_empty() {
            eprintln!("{}", result.output);
        }
        eprintln!("{}", result.error);
    }

    if result.is_ok() {
        0
    } else {
        1
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let code = {
        let _http = httpchain::scoped();
        let result = run(&args);
        report(&args, &result)
    };

    std::process::exit(code);
}
