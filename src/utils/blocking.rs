//! Blocking call surface.
//!
//! Blocking methods drive the same async pipeline on a private current-thread
//! runtime, so planning and aggregation logic is shared between both surfaces.

use std::future::Future;

use crate::error::LlmError;

/// Run `future` to completion on a fresh current-thread runtime.
///
/// Fails when called from inside a Tokio runtime, where blocking the worker
/// thread would stall it; use the async method there instead.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, LlmError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(LlmError::UnsupportedOperation(
            "blocking call made from inside an async runtime; use the async method".to_string(),
        ));
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| LlmError::InternalError(format!("failed to start runtime: {e}")))?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_future_outside_runtime() {
        assert_eq!(block_on(async { 1 + 1 }).unwrap(), 2);
    }

    #[tokio::test]
    async fn refuses_inside_runtime() {
        assert!(matches!(
            block_on(async {}),
            Err(LlmError::UnsupportedOperation(_))
        ));
    }
}
