use crate::models::RawTable;

pub const TIMESTAMP_CANDIDATES: [&str; 8] = [
    "timestamp",
    "datetime",
    "time",
    "date_time",
    "dato",
    "tidspunkt",
    "date",
    "created_at",
];

pub const COUNT_CANDIDATES: [&str; 11] = [
    "count",
    "counts",
    "value",
    "passes",
    "antal",
    "trafik",
    "bike",
    "cykler",
    "bicycle",
    "vehicle",
    "køretøj",
];

pub const COUNTER_ID_CANDIDATES: [&str; 7] = [
    "counter_id",
    "counterid",
    "sensor_id",
    "site_id",
    "id",
    "lokation_id",
    "location_id",
];

pub const COUNTER_NAME_CANDIDATES: [&str; 8] = [
    "counter_name",
    "name",
    "sensor_name",
    "site_name",
    "lokation",
    "location",
    "sted",
    "place",
];

pub const AADT_BIKE_CANDIDATES: [&str; 4] = ["aadt_bike", "aadt_cykler", "bike_aadt", "cykler_aadt"];
pub const AADT_CAR_CANDIDATES: [&str; 4] = ["aadt_car", "aadt_bil", "car_aadt", "bil_aadt"];
pub const AADT_TOTAL_CANDIDATES: [&str; 2] = ["aadt_total", "total_aadt"];

/// Column positions found in a raw counter export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedColumns {
    pub timestamp: Option<usize>,
    pub count: Option<usize>,
    pub counter_id: Option<usize>,
    pub counter_name: Option<usize>,
    pub aadt_bike: Option<usize>,
    pub aadt_car: Option<usize>,
    pub aadt_total: Option<usize>,
}

impl DetectedColumns {
    pub fn is_aadt(&self) -> bool {
        self.aadt_bike.is_some() || self.aadt_car.is_some() || self.aadt_total.is_some()
    }

    /// AADT count column by preference: bikes, then cars, then the total
    pub fn aadt_count(&self) -> Option<usize> {
        self.aadt_bike.or(self.aadt_car).or(self.aadt_total)
    }
}

/// Picks columns by the first candidate name present, ignoring case
pub struct ColumnDetector;

impl ColumnDetector {
    pub fn detect(table: &RawTable) -> DetectedColumns {
        DetectedColumns {
            timestamp: Self::pick(table, &TIMESTAMP_CANDIDATES),
            count: Self::pick(table, &COUNT_CANDIDATES),
            counter_id: Self::pick(table, &COUNTER_ID_CANDIDATES),
            counter_name: Self::pick(table, &COUNTER_NAME_CANDIDATES),
            aadt_bike: Self::pick(table, &AADT_BIKE_CANDIDATES),
            aadt_car: Self::pick(table, &AADT_CAR_CANDIDATES),
            aadt_total: Self::pick(table, &AADT_TOTAL_CANDIDATES),
        }
    }

    pub fn pick(table: &RawTable, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|c| table.column_index(c))
    }
}
