//! Console flow of the handshake. Output goes to any writer so the binary can
//! use stdout while tests capture a buffer.

use std::io::{self, Write};

use log::info;

use crate::verifier::{VerificationResult, Verifier};

pub const BANNER: &str = "--- INITIATING VOID HANDSHAKE ---";
pub const VERIFYING: &str = "VERIFYING_IDENTITY...";
pub const MISSING_SECRET: &str = "CRITICAL: MISSION_SECRET MISSING. THE VOID IS UNSTABLE.";
pub const UNREADABLE_SECRET: &str = "CRITICAL: MISSION_SECRET IS NOT VALID UTF-8. THE VOID IS UNSTABLE.";

pub fn write_banner(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{BANNER}")
}

/// Prints the verification notice, checks `candidate`, and prints the result.
pub fn run(
    verifier: &Verifier<'_>,
    candidate: &str,
    out: &mut impl Write,
) -> io::Result<VerificationResult> {
    writeln!(out, "{VERIFYING}")?;
    let result = verifier.verify(candidate);
    info!("verification finished: {}", result.as_str());
    writeln!(out, "{result}")?;
    Ok(result)
}
