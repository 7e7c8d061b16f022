// Common functions between tools

use std::time::Duration;

use clap::{Arg, ArgMatches, Command};
use devstore::{config::Credentials, DeviceSession, SessionConfig};

/// Connection options shared by every subcommand
pub fn connection_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Address of the device, overrides DEVSTORE_HOST")
                .global(true),
        )
        .arg(
            Arg::new("username")
                .long("username")
                .value_name("USER")
                .help("Web username of the device")
                .global(true),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .help("Web password of the device")
                .global(true),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .value_name("PATH")
                .help("Directory the file listing starts from")
                .global(true),
        )
        .arg(
            Arg::new("depth")
                .long("depth")
                .value_name("HOPS")
                .value_parser(clap::value_parser!(u8))
                .help("How many directory levels to descend")
                .global(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .value_parser(clap::value_parser!(u64))
                .help("Per-request timeout, 0 waits forever")
                .global(true),
        )
}

pub fn get_session(matches: &ArgMatches) -> Result<DeviceSession, String> {
    let mut config = SessionConfig::from_env().map_err(|e| e.to_string())?;

    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }
    if let Some(username) = matches.get_one::<String>("username") {
        config.credentials = Some(Credentials {
            username: username.clone(),
            password: matches
                .get_one::<String>("password")
                .cloned()
                .unwrap_or_default(),
        });
    } else if let Some(password) = matches.get_one::<String>("password") {
        match config.credentials.as_mut() {
            Some(c) => c.password = password.clone(),
            None => return Err("--password needs --username".to_string()),
        }
    }
    if let Some(root) = matches.get_one::<String>("root") {
        config.root = root.clone();
    }
    if let Some(depth) = matches.get_one::<u8>("depth") {
        config.depth = *depth;
    }
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        config.request_timeout = (*secs > 0).then(|| Duration::from_secs(*secs));
    }

    DeviceSession::connect(config).map_err(|e| format!("Unable to create session: {e}"))
}
