use serde::Serialize;

/// The device parameters the configurator keeps in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KnownParameter {
    CoinWidth,
    CoinHeight,
    CoinColorPrintHead,
    Logo,
    LogoColorPrintHead,
}

/// Allowed coin widths in millimetres.
pub const COIN_WIDTH_CHOICES: [f32; 4] = [20.0, 23.25, 25.75, 30.0];
/// Inclusive coin height range in millimetres.
pub const COIN_HEIGHT_RANGE: (f32, f32) = (2.1, 4.0);
/// Logo tags understood by the printer.
pub const LOGO_OPTIONS: [&str; 4] = ["None", "PROCEED", "SNET", "TUB"];
/// Number of physical print heads.
pub const PRINT_HEAD_COUNT: u8 = 5;

impl KnownParameter {
    pub const ALL: [KnownParameter; 5] = [
        KnownParameter::CoinWidth,
        KnownParameter::CoinHeight,
        KnownParameter::CoinColorPrintHead,
        KnownParameter::Logo,
        KnownParameter::LogoColorPrintHead,
    ];

    /// Stable remote identifier.
    pub fn id(self) -> &'static str {
        match self {
            KnownParameter::CoinWidth => "d9f2f73b-1ce1-4951-a377-0a6f4ca0b5a3",
            KnownParameter::CoinHeight => "378a4533-e4e1-4e5d-96b0-2bf2acb3bdfb",
            KnownParameter::CoinColorPrintHead => "95ee9a73-2c1e-484c-bf42-a8b22c031966",
            KnownParameter::Logo => "34867e05-9c0b-4031-b81c-16aed8bbbcd0",
            KnownParameter::LogoColorPrintHead => "4902ccfc-d8fb-453e-8ef8-34b06bbdce44",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            KnownParameter::CoinWidth => "coin_width",
            KnownParameter::CoinHeight => "coin_height",
            KnownParameter::CoinColorPrintHead => "coin_color_print_head",
            KnownParameter::Logo => "logo",
            KnownParameter::LogoColorPrintHead => "logo_color_print_head",
        }
    }

    pub fn domain(self) -> ValueDomain {
        match self {
            KnownParameter::CoinWidth => ValueDomain::Choices(&COIN_WIDTH_CHOICES),
            KnownParameter::CoinHeight => ValueDomain::Range {
                min: COIN_HEIGHT_RANGE.0,
                max: COIN_HEIGHT_RANGE.1,
            },
            KnownParameter::Logo => ValueDomain::Options(&LOGO_OPTIONS),
            KnownParameter::CoinColorPrintHead | KnownParameter::LogoColorPrintHead => {
                ValueDomain::PrintHead
            }
        }
    }

    /// Identifiers of every known parameter, in declaration order.
    pub fn all_ids() -> Vec<String> {
        Self::ALL.iter().map(|p| p.id().to_string()).collect()
    }
}

/// The values the presentation layer may offer for a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueDomain {
    Choices(&'static [f32]),
    Range { min: f32, max: f32 },
    Options(&'static [&'static str]),
    PrintHead,
}

impl ValueDomain {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            ValueDomain::Choices(choices) => value
                .trim()
                .parse::<f32>()
                .map(|v| choices.iter().any(|c| (c - v).abs() < f32::EPSILON))
                .unwrap_or(false),
            ValueDomain::Range { min, max } => value
                .trim()
                .parse::<f32>()
                .map(|v| v >= *min && v <= *max)
                .unwrap_or(false),
            ValueDomain::Options(options) => options.iter().any(|o| *o == value),
            ValueDomain::PrintHead => value
                .trim()
                .parse::<u8>()
                .map(|h| (1..=PRINT_HEAD_COUNT).contains(&h))
                .unwrap_or(false),
        }
    }
}
