//! Reference tables and load-time abnormality rules for observations.

/// Population mean and standard deviation of a vital sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalStats {
    pub mean: f64,
    pub std: f64,
}

/// Inclusive normal range of a vital sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalRange {
    pub lower: f64,
    pub upper: f64,
}

impl NormalRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

pub const VITAL_SIGN_NAMES: [&str; 11] = [
    "heart_rate",
    "sbp",
    "dbp",
    "mbp",
    "sbp_ni",
    "dbp_ni",
    "mbp_ni",
    "resp_rate",
    "temperature",
    "spo2",
    "glucose",
];

pub fn vital_stats(name: &str) -> Option<VitalStats> {
    let (mean, std) = match name {
        "heart_rate" => (86.23006544257588, 18.364919551828184),
        "sbp" => (119.55375842307342, 18.364919551828184),
        "dbp" => (62.74514989155536, 18.364919551828184),
        "mbp" => (78.72341439390176, 18.364919551828184),
        "sbp_ni" => (119.70233195360974, 22.228975865183298),
        "dbp_ni" => (64.95822761647382, 15.789699072474713),
        "mbp_ni" => (78.45314922472335, 15.916864499184568),
        "resp_rate" => (20.112680079313726, 5.8645482996371205),
        "temperature" => (36.95860056154703, 0.7049866294930923),
        "spo2" => (96.75828969532087, 3.348053473737268),
        "glucose" => (148.22641204002312, 62.023916929276474),
        _ => return None,
    };
    Some(VitalStats { mean, std })
}

/// Adult normal ranges (temperature in °C, glucose in mg/dL).
pub fn normal_range(name: &str) -> Option<NormalRange> {
    let (lower, upper) = match name {
        "heart_rate" => (60.0, 100.0),
        "sbp" | "sbp_ni" => (90.0, 140.0),
        "dbp" | "dbp_ni" => (60.0, 90.0),
        "mbp" | "mbp_ni" => (65.0, 110.0),
        "resp_rate" => (12.0, 20.0),
        "temperature" => (36.0, 38.0),
        "spo2" => (95.0, 100.0),
        "glucose" => (70.0, 140.0),
        _ => return None,
    };
    Some(NormalRange { lower, upper })
}

/// Reference range first, then mean ± 2·std, else not abnormal.
pub fn labevent_is_abnormal(
    value: f64,
    ref_lower: Option<f64>,
    ref_upper: Option<f64>,
    mean: Option<f64>,
    std: Option<f64>,
) -> bool {
    if let (Some(lower), Some(upper)) = (ref_lower, ref_upper) {
        return value < lower || value > upper;
    }
    if let (Some(mean), Some(std)) = (mean, std) {
        return value < mean - 2.0 * std || value > mean + 2.0 * std;
    }
    false
}

/// Missing values and unknown vital signs count as abnormal.
pub fn vitalsign_is_abnormal(name: &str, value: Option<f64>) -> bool {
    match (value, normal_range(name)) {
        (Some(v), Some(range)) => !range.contains(v),
        _ => true,
    }
}
