//! US EPA Air Quality Index for PM2.5.
//!
//! Breakpoints follow the EPA's
//! [AQI technical assistance document](https://www.airnow.gov/publications/air-quality-index/technical-assistance-document-for-reporting-the-daily-aqi/).
//! The correction for PurpleAir sensors is the EPA's nationwide
//! [US-wide correction](https://www.epa.gov/air-sensor-toolbox/technical-approaches-sensor-data-air-quality-index-aqi-and-nowcast)
//! for humidity bias.

/// Relative humidity assumed when a sensor doesn't report one.
const DEFAULT_HUMIDITY: f64 = 50.0;

/// PM2.5 (µg/m³, 24h) roughly equivalent to smoking one cigarette a day.
pub const PM25_PER_CIGARETTE: f64 = 22.0;

/// Health category for a range of AQI values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl Category {
    /// Name as shown to users.
    pub const fn label(&self) -> &'static str {
        match self {
            Category::Good => "Good",
            Category::Moderate => "Moderate",
            Category::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Category::Unhealthy => "Unhealthy",
            Category::VeryUnhealthy => "Very Unhealthy",
            Category::Hazardous => "Hazardous",
        }
    }

    /// Standard EPA color, as a CSS hex string.
    pub const fn color(&self) -> &'static str {
        match self {
            Category::Good => "#00e400",
            Category::Moderate => "#ffff00",
            Category::UnhealthyForSensitiveGroups => "#ff7e00",
            Category::Unhealthy => "#ff0000",
            Category::VeryUnhealthy => "#8f3f97",
            Category::Hazardous => "#7e0023",
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            Category::Good => {
                "Air quality is satisfactory, and air pollution poses little or no risk."
            }
            Category::Moderate => {
                "Air quality is acceptable. However, there may be a risk for some people, \
                 particularly those who are unusually sensitive to air pollution."
            }
            Category::UnhealthyForSensitiveGroups => {
                "Members of sensitive groups may experience health effects. \
                 The general public is less likely to be affected."
            }
            Category::Unhealthy => {
                "Some members of the general public may experience health effects; \
                 members of sensitive groups may experience more serious health effects."
            }
            Category::VeryUnhealthy => {
                "Health alert: The risk of health effects is increased for everyone."
            }
            Category::Hazardous => {
                "Health warning of emergency conditions: everyone is more likely to be affected."
            }
        }
    }
}

/// One row of the PM2.5 breakpoint table.
struct Breakpoint {
    c_low: f64,
    c_high: f64,
    i_low: f64,
    i_high: f64,
    category: Category,
}

const PM25_BREAKPOINTS: [Breakpoint; 6] = [
    Breakpoint {
        c_low: 0.0,
        c_high: 12.0,
        i_low: 0.0,
        i_high: 50.0,
        category: Category::Good,
    },
    Breakpoint {
        c_low: 12.1,
        c_high: 35.4,
        i_low: 51.0,
        i_high: 100.0,
        category: Category::Moderate,
    },
    Breakpoint {
        c_low: 35.5,
        c_high: 55.4,
        i_low: 101.0,
        i_high: 150.0,
        category: Category::UnhealthyForSensitiveGroups,
    },
    Breakpoint {
        c_low: 55.5,
        c_high: 150.4,
        i_low: 151.0,
        i_high: 200.0,
        category: Category::Unhealthy,
    },
    Breakpoint {
        c_low: 150.5,
        c_high: 250.4,
        i_low: 201.0,
        i_high: 300.0,
        category: Category::VeryUnhealthy,
    },
    Breakpoint {
        c_low: 250.5,
        c_high: 500.4,
        i_low: 301.0,
        i_high: 500.0,
        category: Category::Hazardous,
    },
];

/// An AQI value with its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aqi {
    pub value: u32,
    pub category: Category,
}

/// Compute the AQI for a PM2.5 concentration in µg/m³.
///
/// Negative concentrations read as 0; anything beyond the table is 500.
pub fn calculate_aqi(pm25: f64) -> Aqi {
    // The table has one decimal of resolution; truncate so that every
    // value lands inside a band rather than in the gap between two.
    let c = ((pm25.max(0.0) * 10.0) + 1e-9).floor() / 10.0;

    PM25_BREAKPOINTS
        .iter()
        .find(|bp| c >= bp.c_low && c <= bp.c_high)
        .map(|bp| {
            let aqi = (bp.i_high - bp.i_low) / (bp.c_high - bp.c_low) * (c - bp.c_low) + bp.i_low;
            Aqi {
                value: aqi.round() as u32,
                category: bp.category,
            }
        })
        .unwrap_or(Aqi {
            value: 500,
            category: Category::Hazardous,
        })
}

/// Category for an already-computed AQI value.
pub fn category_for(aqi: u32) -> Category {
    match aqi {
        0..=50 => Category::Good,
        51..=100 => Category::Moderate,
        101..=150 => Category::UnhealthyForSensitiveGroups,
        151..=200 => Category::Unhealthy,
        201..=300 => Category::VeryUnhealthy,
        _ => Category::Hazardous,
    }
}

/// Apply the EPA correction to a CF=1 PM2.5 reading.
///
/// `PM2.5 = 0.534 × PM2.5cf1 − 0.0844 × RH + 5.604`, floored at zero.
pub fn epa_correction(pm25_cf1: f64, humidity: Option<f64>) -> f64 {
    let rh = humidity.filter(|h| *h >= 0.0).unwrap_or(DEFAULT_HUMIDITY);
    (0.534 * pm25_cf1 - 0.0844 * rh + 5.604).max(0.0)
}

/// Cigarettes per day equivalent to breathing the given PM2.5 for a day.
pub fn cigarettes(pm25: f64) -> f64 {
    pm25.max(0.0) / PM25_PER_CIGARETTE
}

/// Round to one decimal place.
pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
