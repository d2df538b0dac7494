//! Reading hours and minutes from hand bearings.

use crate::types::{EstimatedTime, HandAngle, HourSource, MinuteRounding};

/// Hour shown when no hour hand was found.
pub const DEFAULT_HOUR: u8 = 12;

/// Minute for a minute-hand bearing: `round(angle / 6) mod 60`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn minute_from_angle(angle: HandAngle, rounding: MinuteRounding) -> u8 {
    let steps = angle.degrees() / 6.0;
    let rounded = match rounding {
        MinuteRounding::HalfAwayFromZero => steps.round(),
        MinuteRounding::HalfToEven => steps.round_ties_even(),
    };
    // Bearings are below 360, so `rounded` is at most 60.
    rounded as u8 % 60
}

/// Hour for an hour-hand bearing: `floor(angle / 30) mod 12`, with 0
/// shown as 12.
#[must_use]
pub fn hour_from_angle(angle: HandAngle) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let hour = (angle.degrees() / 30.0).floor() as u8 % 12;
    if hour == 0 { DEFAULT_HOUR } else { hour }
}

/// Combine the optional hand bearings into a time.
///
/// No minute hand means no estimate. A missing hour hand defaults the hour
/// to [`DEFAULT_HOUR`] and marks it [`HourSource::Defaulted`].
#[must_use]
pub fn derive_time(
    minute: Option<HandAngle>,
    hour: Option<HandAngle>,
    rounding: MinuteRounding,
) -> Option<EstimatedTime> {
    let minute = minute_from_angle(minute?, rounding);
    let (hour, hour_source) = hour.map_or((DEFAULT_HOUR, HourSource::Defaulted), |h| {
        (hour_from_angle(h), HourSource::Detected)
    });
    Some(EstimatedTime {
        hour,
        minute,
        hour_source,
    })
}
