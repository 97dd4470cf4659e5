//! Cancellation context threaded through repositories and use cases

use super::DomainError;

pub use tokio_util::sync::CancellationToken as Context;

/// Fails fast when the caller has already given up on the operation
pub fn ensure_active(ctx: &Context) -> Result<(), DomainError> {
    if ctx.is_cancelled() {
        return Err(DomainError::Cancelled);
    }

    Ok(())
}
