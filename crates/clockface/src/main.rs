//! clockface: print the time shown on an analog clock in a base64 image.
//!
//! Takes exactly one argument, a base64-encoded image (PNG, JPEG, BMP,
//! WebP, GIF). Missing `=` padding is restored before decoding. Prints
//! `HH:MM` or `Time could not be estimated.` and exits 0; prints an error
//! to stderr and exits 1 on bad usage or an undecodable payload.
//!
//! # Usage
//!
//! ```text
//! clockface <BASE64_IMAGE>
//! ```
//!
//! Set `RUST_LOG=clockface_pipeline=debug` to trace the pipeline stages.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD};
use clap::Parser;
use clockface_pipeline::{Estimate, PipelineConfig, PipelineError};

/// Estimate the time shown on an analog clock face.
#[derive(Parser)]
#[command(name = "clockface", version)]
struct Cli {
    /// Base64-encoded image payload; padding may be omitted.
    payload: String,
}

/// Standard alphabet. Like most decoders, stray bits in the final
/// character are ignored rather than rejected.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    PAD.with_decode_allow_trailing_bits(true),
);

/// Failures at the input boundary.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Error decoding base64 image string: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Error: unable to load the image: {0}")]
    Image(#[from] PipelineError),
}

/// Append `=` until the length is a multiple of 4.
fn pad_base64(payload: &str) -> String {
    let missing = (4 - payload.len() % 4) % 4;
    let mut padded = String::with_capacity(payload.len() + missing);
    padded.push_str(payload);
    padded.extend(std::iter::repeat_n('=', missing));
    padded
}

/// Decode a possibly unpadded base64 payload.
fn decode_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    PAYLOAD_ENGINE.decode(pad_base64(payload.trim()))
}

fn run(payload: &str) -> Result<Estimate, CliError> {
    let bytes = decode_payload(payload)?;
    tracing::debug!(bytes = bytes.len(), "payload decoded");
    Ok(clockface_pipeline::estimate(
        &bytes,
        &PipelineConfig::default(),
    )?)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version go to stdout and are not failures.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&cli.payload) {
        Ok(estimate) => {
            println!("{estimate}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn padding_restores_multiple_of_four() {
        assert_eq!(pad_base64(""), "");
        assert_eq!(pad_base64("aGk"), "aGk=");
        assert_eq!(pad_base64("aA"), "aA==");
        assert_eq!(pad_base64("aGVs"), "aGVs");
        assert_eq!(pad_base64("aGVsbG8="), "aGVsbG8=");
    }

    #[test]
    fn decodes_unpadded_payload() {
        assert_eq!(decode_payload("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_payload("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_payload(" aGk \n").unwrap(), b"hi");
    }

    #[test]
    fn rejects_non_base64_characters() {
        assert!(decode_payload("not base64!!").is_err());
        assert!(decode_payload("aGVs*G8=").is_err());
    }

    #[test]
    fn tolerates_trailing_bits() {
        // "aGl" decodes to "hi" with non-zero trailing bits in 'l'.
        assert_eq!(decode_payload("aGl").unwrap(), b"hi");
    }

    #[test]
    fn non_image_payload_is_an_image_error() {
        assert!(matches!(run("aGVsbG8"), Err(CliError::Image(_))));
        assert!(matches!(run("@@@"), Err(CliError::Base64(_))));
    }

    #[test]
    fn cli_requires_exactly_one_argument() {
        assert!(Cli::try_parse_from(["clockface"]).is_err());
        assert!(Cli::try_parse_from(["clockface", "a", "b"]).is_err());
        assert_eq!(
            Cli::try_parse_from(["clockface", "aGk"]).unwrap().payload,
            "aGk"
        );
    }
}
