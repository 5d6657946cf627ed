// Copyright 2024-2025, Offchain Labs, Inc.
// For licensing, see https://github.com/OffchainLabs/stylus-sdk-rs/blob/main/licenses/COPYRIGHT.md

//! Pricing and limits of a single program call.

use stylus_core::StylusParams;

/// Ink charged on entry to every host call, on top of what the call itself costs.
pub const HOSTIO_INK: u64 = 8400;

/// Scales the quadratic memory term: `page_ramp * pages² >> RAMP_SHIFT` gas.
pub const RAMP_SHIFT: u32 = 18;

/// Limits and prices for one program call, copied from the params at call start.
///
/// A call never re-reads the params, so a governance change made while the call runs has no
/// effect on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub version: u16,
    pub max_depth: u32,
    /// Ink per gas.
    pub ink_price: u32,
    pub hostio_ink: u64,
    pub page_limit: u16,
    pub free_pages: u16,
    pub page_gas: u16,
    pub page_ramp: u64,
}

impl CallContext {
    pub fn new(params: &StylusParams) -> Self {
        Self {
            version: params.version,
            max_depth: params.max_stack_depth,
            ink_price: params.ink_price,
            hostio_ink: HOSTIO_INK,
            page_limit: params.page_limit,
            free_pages: params.free_pages,
            page_gas: params.page_gas,
            page_ramp: params.page_ramp,
        }
    }

    pub fn gas_to_ink(&self, gas: u64) -> u64 {
        gas.saturating_mul(self.ink_price.into())
    }

    pub fn ink_to_gas(&self, ink: u64) -> u64 {
        ink / u64::from(self.ink_price.max(1))
    }

    /// Gas to open `new` pages when `open` are open now and `ever` have been open at once.
    ///
    /// The first `free_pages` cost nothing. Each page past them costs `page_gas`, and the
    /// high-water mark pays a quadratic ramp so that large memories grow expensive quickly.
    /// Pages that were open before and got released are only charged the linear term.
    pub fn memory_gas(&self, new: u16, open: u16, ever: u16) -> u64 {
        let new_open = open.saturating_add(new);
        let new_ever = ever.max(new_open);
        if new_ever <= self.free_pages {
            return 0;
        }

        let paid = |pages: u16| pages.saturating_sub(self.free_pages);
        let adding = paid(new_open) - paid(open);
        let linear = u64::from(adding).saturating_mul(self.page_gas.into());
        let ramp = self.ramp(paid(new_ever)).saturating_sub(self.ramp(paid(ever)));
        linear.saturating_add(ramp)
    }

    fn ramp(&self, pages: u16) -> u64 {
        let pages = u128::from(pages);
        let cost = (u128::from(self.page_ramp) * pages * pages) >> RAMP_SHIFT;
        u64::try_from(cost).unwrap_or(u64::MAX)
    }
}
