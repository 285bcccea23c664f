use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::fixedpoint::Micros;

/// BUY or SELL for trades.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Direction of the quantity change: `+1` for Buy, `-1` for Sell.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Contract kind of a traded instrument.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
    Future,
    #[default]
    None,
}

impl OptionType {
    pub fn product(&self) -> Product {
        match self {
            OptionType::Call | OptionType::Put => Product::Option,
            OptionType::Future => Product::Futures,
            OptionType::None => Product::None,
        }
    }

    /// Exchange shorthand used in tradebook exports (`CE`, `PE`, `FUT`).
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "CE",
            OptionType::Put => "PE",
            OptionType::Future => "FUT",
            OptionType::None => "",
        }
    }
}

/// Product class, always derived from [`OptionType`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Product {
    Option,
    Futures,
    #[default]
    None,
}

impl Product {
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Option => "Option",
            Product::Futures => "Futures",
            Product::None => "",
        }
    }
}

/// Contract metadata carried by every trade and copied onto the position it
/// opens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMeta {
    pub underlying: String,
    /// Instant after which an open position is force-closed at zero price.
    pub expiry: NaiveDateTime,
    pub strike: Option<Micros>,
    pub option_type: OptionType,
}

impl ContractMeta {
    pub fn new<S: Into<String>>(underlying: S, expiry: NaiveDateTime) -> Self {
        Self {
            underlying: underlying.into(),
            expiry,
            strike: None,
            option_type: OptionType::None,
        }
    }

    pub fn with_strike(mut self, strike: Micros) -> Self {
        self.strike = Some(strike);
        self
    }

    pub fn with_option_type(mut self, option_type: OptionType) -> Self {
        self.option_type = option_type;
        self
    }

    pub fn product(&self) -> Product {
        self.option_type.product()
    }
}

/// A single normalized execution (the replay atom).
///
/// quantity is always positive; direction lives in `side`.
/// price is per unit in micros and never negative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTrade {
    pub symbol: String,
    pub execution_time: NaiveDateTime,
    pub side: Side,
    pub quantity: i64,
    pub price: Micros,
    pub contract: ContractMeta,
}

impl NormalizedTrade {
    pub fn new<S: Into<String>>(
        symbol: S,
        execution_time: NaiveDateTime,
        side: Side,
        quantity: i64,
        price: Micros,
        contract: ContractMeta,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            execution_time,
            side,
            quantity,
            price,
            contract,
        }
    }

    /// `true` when the trade executes strictly after its own contract expiry.
    pub fn is_past_own_expiry(&self) -> bool {
        self.execution_time > self.contract.expiry
    }

    /// Cash moved by this trade: negative for buys, positive for sells.
    pub fn cash_flow(&self) -> Option<Micros> {
        let gross = self.price.checked_mul_qty(self.quantity)?;
        match self.side {
            Side::Buy => gross.checked_neg(),
            Side::Sell => Some(gross),
        }
    }
}

/// Running position for one symbol.
///
/// `signed_quantity` is never stored at zero: a flat symbol has no entry in
/// the ledger. `accumulated_cost` is non-negative for both directions, so
/// `avg_price` is non-negative too.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionState {
    pub symbol: String,
    /// +long, -short.
    pub signed_quantity: i64,
    pub accumulated_cost: Micros,
    /// `|accumulated_cost / signed_quantity|`, recomputed on every mutation.
    pub avg_price: Micros,
    pub contract: ContractMeta,
}

impl PositionState {
    /// A zero-seeded state carrying the opening trade's contract metadata.
    pub fn seeded<S: Into<String>>(symbol: S, contract: ContractMeta) -> Self {
        Self {
            symbol: symbol.into(),
            signed_quantity: 0,
            accumulated_cost: Micros::ZERO,
            avg_price: Micros::ZERO,
            contract,
        }
    }

    pub fn is_long(&self) -> bool {
        self.signed_quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.signed_quantity < 0
    }

    pub fn abs_qty(&self) -> i64 {
        self.signed_quantity.abs()
    }

    pub fn expiry(&self) -> NaiveDateTime {
        self.contract.expiry
    }

    pub fn product(&self) -> Product {
        self.contract.product()
    }
}
