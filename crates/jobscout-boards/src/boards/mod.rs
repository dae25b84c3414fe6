//! Built-in job boards.

mod indeed;
mod linkedin;

pub use indeed::IndeedBoard;
pub use linkedin::LinkedInBoard;

use crate::error::{Result, ScrapeError};
use jobscout_core::BoardId;
use std::sync::Arc;

use crate::contract::JobBoard;

fn builtin_id(id: &str) -> Result<BoardId> {
    BoardId::new(id).map_err(|e| ScrapeError::Configuration(e.to_string()))
}

/// Every built-in board, in registration order.
pub fn builtin_boards() -> Result<Vec<Arc<dyn JobBoard>>> {
    Ok(vec![
        Arc::new(LinkedInBoard::new()?),
        Arc::new(IndeedBoard::new()?),
    ])
}
