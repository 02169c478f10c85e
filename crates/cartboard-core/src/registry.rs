//! Chip-id to implementation mapping.

use std::fmt::Debug;

use crate::chip::Chip;
use crate::chips::{CnRom, Mmc1, Mmc3, Nrom, UxRom, Vrc4};
use crate::error::LoadError;
use crate::params::BoardParams;

/// Source of user-provided chips for ids the builtin registry does not know.
///
/// Consulted only after the builtin table misses; returning `None` defers to
/// [`LoadError::UnsupportedChip`].
pub trait ChipProvider: Debug + Send {
    fn chip_for(&self, params: &BoardParams) -> Option<Box<dyn Chip>>;
}

/// Instantiate the builtin chip for `params.chip_id`.
pub fn builtin_chip(params: &BoardParams) -> Result<Box<dyn Chip>, LoadError> {
    let chip: Box<dyn Chip> = match params.chip_id {
        0 => Box::new(Nrom::new(params)),
        1 => Box::new(Mmc1::new(params)),
        2 => Box::new(UxRom::new(params)),
        3 => Box::new(CnRom::new(params)),
        4 => Box::new(Mmc3::new(params)),
        23 => Box::new(Vrc4::new(params)),
        id => return Err(LoadError::UnsupportedChip { id }),
    };
    tracing::debug!(
        id = params.chip_id,
        name = %chip.metadata().name,
        "selected builtin chip"
    );
    Ok(chip)
}

/// Builtin table first, then the provider.
pub fn resolve_chip(
    params: &BoardParams,
    provider: Option<&dyn ChipProvider>,
) -> Result<Box<dyn Chip>, LoadError> {
    match builtin_chip(params) {
        Err(LoadError::UnsupportedChip { id }) => provider
            .and_then(|p| p.chip_for(params))
            .ok_or(LoadError::UnsupportedChip { id }),
        other => other,
    }
}
