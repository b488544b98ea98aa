//! I/O error classification and retry for store backends.

use std::io::ErrorKind;
use std::time::Duration;

use crate::error::SinkError;

/// Classifies an I/O error as transient or permanent store failure.
pub fn classify_io_error(error: std::io::Error, context: &str) -> SinkError {
    match error.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
            SinkError::TransientStore(format!("{}: {}", context, error))
        }
        _ => SinkError::Store(format!("{}: {}", context, error)),
    }
}

/// Retries `operation` while it fails with a transient store error.
///
/// Any other error is returned immediately.
pub fn retry_store_operation<F, T>(
    mut operation: F,
    max_retries: u32,
    retry_delay_ms: u64,
    context: &str,
) -> Result<T, SinkError>
where
    F: FnMut() -> Result<T, SinkError>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(SinkError::TransientStore(msg)) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    "Transient store error in {} (attempt {}/{}): {}",
                    context,
                    attempt,
                    max_retries,
                    msg
                );
                if retry_delay_ms > 0 {
                    std::thread::sleep(Duration::from_millis(retry_delay_ms));
                }
            }
            Err(err) => return Err(err),
        }
    }
}
