//! Astronomical routines: position of the sun and extraterrestrial
//! radiation for a given site and hour of the year, following the
//! calculation path of BS EN ISO 52010-1:2017.

/// Position of the sun for one hour, in degrees.
///
/// `height` is the solar altitude above the horizon (0 when the sun is
/// below it). `azimuth` uses compass convention: 0 = North, clockwise,
/// in [0, 360).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SunPosition {
    pub height: f64,
    pub azimuth: f64,
}

/// Sun position in the middle of the given hour.
///
/// `day` is the 1-indexed day of the year, `hour_of_day` in 0..24.
pub fn sun_position(
    latitude: f64,
    longitude: f64,
    timezone: f64,
    day: u32,
    hour_of_day: u32,
) -> SunPosition {
    let declination = solar_declination(earth_orbit_deviation(day));
    let solar_time =
        (hour_of_day + 1) as f64 - equation_of_time(day) / 60.0 - time_shift(timezone, longitude);
    let hour_angle = solar_hour_angle(solar_time);
    let altitude = solar_altitude(latitude, declination, hour_angle);
    let azimuth = solar_azimuth(latitude, declination, hour_angle, altitude);

    SunPosition {
        height: altitude,
        azimuth: (180.0 - azimuth).rem_euclid(360.0),
    }
}

/// Normal-incidence extraterrestrial radiation for the given 1-indexed
/// day of the year, in W/m2.
pub fn extra_terrestrial_radiation(day: u32) -> f64 {
    // ISO 52010 lists G_sol;c as the angle of incidence here; it is in
    // fact the solar constant, 1367 W/m2
    1367.0 * (1.0 + 0.033 * earth_orbit_deviation(day).to_radians().cos())
}

/// Angular deviation of the earth on its orbit, in degrees.
fn earth_orbit_deviation(day: u32) -> f64 {
    (360.0 / 365.0) * day as f64
}

/// Solar declination, in degrees.
fn solar_declination(earth_orbit_deviation: f64) -> f64 {
    let rd = earth_orbit_deviation.to_radians();

    0.33281 - 22.984 * rd.cos() - 0.3499 * (2.0 * rd).cos() - 0.1398 * (3.0 * rd).cos()
        + 3.7872 * rd.sin()
        + 0.03205 * (2.0 * rd).sin()
        + 0.07187 * (3.0 * rd).sin()
}

/// Equation of time, in minutes, for the 1-indexed day of the year.
fn equation_of_time(day: u32) -> f64 {
    let nday = day as i32;

    // the factors inside cos() are already radians; the piecewise fit is
    // taken as written in ISO 52010
    match nday {
        nday if nday < 21 => 2.6 + 0.44 * nday as f64,
        nday if nday < 136 => 5.2 + 9.0 * ((nday - 43) as f64 * 0.0357).cos(),
        nday if nday < 241 => 1.4 - 5.0 * ((nday - 135) as f64 * 0.0449).cos(),
        nday if nday < 336 => -6.3 - 10.0 * ((nday - 306) as f64 * 0.036).cos(),
        _ => 0.45 * (nday - 359) as f64,
    }
}

/// Time shift in hours between zone time and solar time at the site
/// longitude. Daylight saving is disregarded.
fn time_shift(timezone: f64, longitude: f64) -> f64 {
    timezone - longitude / 15.0
}

/// Solar hour angle in the middle of the current hour, in degrees,
/// limited to [-180, 180].
fn solar_hour_angle(solar_time: f64) -> f64 {
    // hour N covers (N-1)h..Nh of the solar day, so its average sun
    // position is at solar time N - 0.5
    let mut angle = (180.0 / 12.0) * (12.5 - solar_time);

    if angle > 180.0 {
        angle -= 360.0;
    } else if angle < -180.0 {
        angle += 360.0;
    }

    angle
}

/// Angle between the solar beam and the horizontal surface, in degrees.
fn solar_altitude(latitude: f64, solar_declination: f64, solar_hour_angle: f64) -> f64 {
    let latitude = latitude.to_radians();
    let declination = solar_declination.to_radians();
    let hour_angle = solar_hour_angle.to_radians();

    let altitude = (declination.sin() * latitude.sin()
        + declination.cos() * latitude.cos() * hour_angle.cos())
    .asin()
    .to_degrees();

    if altitude < 0.0001 {
        return 0.;
    }

    altitude
}

/// Solar azimuth angle from South, eastwards positive, in [-180, 180]
/// degrees (BS EN ISO 52010-1:2017 formula 16).
fn solar_azimuth(
    latitude: f64,
    solar_declination: f64,
    solar_hour_angle: f64,
    solar_altitude: f64,
) -> f64 {
    let latitude = latitude.to_radians();
    let declination = solar_declination.to_radians();
    let hour_angle = (180.0 - solar_hour_angle).to_radians();
    let altitude = solar_altitude.to_radians();

    let sin_aux1_numerator = declination.cos() * hour_angle.sin();
    let cos_aux1_numerator =
        latitude.cos() * declination.sin() + latitude.sin() * declination.cos() * hour_angle.cos();

    let denominator = altitude.sin().asin().cos();

    let sin_aux1 = sin_aux1_numerator / denominator;
    let cos_aux1 = cos_aux1_numerator / denominator;
    let aux2 = (sin_aux1_numerator.asin() / denominator).to_degrees();

    if sin_aux1 >= 0.0 && cos_aux1 > 0.0 {
        if aux2 > 180.0 {
            aux2 - 180.0
        } else {
            180.0 - aux2
        }
    } else if cos_aux1 < 0.0 {
        aux2
    } else {
        -(180.0 + aux2)
    }
}
