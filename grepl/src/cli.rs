//! # CLI
//!
//! This module defines the command-line interface of `grepl` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring headers are `key:value`).
//! Most options can also be given through `GREPL_*` environment variables.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "grepl", version, about = "Interactive, schema-driven gRPC client")]
pub struct Cli {
    /// The server URL to connect to (e.g. http://localhost:50051)
    #[arg(env = "GREPL_URL")]
    pub url: String,

    /// Path to the descriptor set (.bin). Server reflection is used when omitted.
    #[arg(long, global = true, env = "GREPL_FILE_DESCRIPTOR_SET")]
    pub file_descriptor_set: Option<PathBuf>,

    /// Header sent with every request, as 'key:value'. Can be repeated, before the command.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Call an RPC, building the request(s) field by field
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// grepl http://localhost:50051 call --package api --service Example Unary
    /// grepl http://localhost:50051 call api.Example.Unary --json < requests.json
    /// ```
    Call {
        /// A method of the selected service, or a fully qualified 'package.Service.Method'
        rpc: String,

        /// Package to select before resolving the RPC
        #[arg(long, env = "GREPL_PACKAGE")]
        package: Option<String>,

        /// Service of the selected package
        #[arg(long, env = "GREPL_SERVICE")]
        service: Option<String>,

        /// Read requests as JSON documents from stdin instead of prompting
        #[arg(long, env = "GREPL_JSON")]
        json: bool,

        /// Treat the input of bytes fields as a file path and send the file content
        #[arg(long, env = "GREPL_BYTES_FROM_FILE")]
        bytes_from_file: bool,

        /// Print fields holding their default value too
        #[arg(long, env = "GREPL_EMIT_DEFAULTS")]
        emit_defaults: bool,
    },

    /// List available services or packages
    List {
        #[command(subcommand)]
        sub: ListCommands,
    },

    /// Describe a service, message or enum
    Describe {
        /// Fully qualified symbol name (e.g. my.package.Message)
        symbol: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ListCommands {
    /// List all services
    Services,
    /// List all packages declaring at least one service
    Packages,
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_call_with_global_options() {
        let cli = Cli::try_parse_from([
            "grepl",
            "http://localhost:50051",
            "-H",
            "authorization: Bearer token",
            "--header",
            "x-request-id:42",
            "--file-descriptor-set",
            "api.bin",
            "call",
            "--package",
            "api",
            "--service",
            "Example",
            "Unary",
        ])
        .unwrap();

        assert_eq!(cli.url, "http://localhost:50051");
        assert_eq!(cli.file_descriptor_set, Some(PathBuf::from("api.bin")));
        assert_eq!(
            cli.headers,
            [
                ("authorization".to_string(), "Bearer token".to_string()),
                ("x-request-id".to_string(), "42".to_string()),
            ]
        );
        assert!(matches!(
            cli.command,
            Commands::Call { ref rpc, package: Some(ref p), service: Some(ref s), json: false, .. }
                if rpc == "Unary" && p == "api" && s == "Example"
        ));
    }

    #[test]
    fn keeps_every_header_given_before_the_command() {
        let cli = Cli::try_parse_from([
            "grepl",
            "http://localhost",
            "-H",
            "a:1",
            "-H",
            "b:2",
            "-H",
            "a:3",
            "list",
            "services",
        ])
        .unwrap();

        assert_eq!(
            cli.headers,
            [
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_header_after_the_command() {
        let result = Cli::try_parse_from([
            "grepl",
            "http://localhost",
            "-H",
            "a:1",
            "call",
            "Unary",
            "-H",
            "b:2",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn rejects_header_without_separator() {
        let result = Cli::try_parse_from(["grepl", "http://localhost", "-H", "broken", "list", "services"]);

        assert!(result.is_err());
    }

    #[test]
    fn parses_list_and_describe() {
        let cli = Cli::try_parse_from(["grepl", "http://localhost", "list", "packages"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List {
                sub: ListCommands::Packages
            }
        ));

        let cli = Cli::try_parse_from(["grepl", "http://localhost", "describe", "api.Person"]).unwrap();
        assert!(matches!(cli.command, Commands::Describe { ref symbol } if symbol == "api.Person"));
    }
}
