//! Logical field → physical column resolution
//!
//! Public 311 datasets drift between snapshots and between API and CSV
//! exports. Each logical field has an ordered list of physical name
//! variants; the first one present wins. Resolution happens once per
//! dataset and is never repeated mid-run.

use std::collections::BTreeMap;

/// Date columns the fetcher may filter on, true timestamp types first
pub const DATE_FIELD_CANDIDATES: &[&str] = &[
    "requested_datetime",
    "last_modified_date",
    "closed_date",
    "created_date",
    "creation_date",
    "open_date",
    "sr_created_date",
    "date_created",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogicalField {
    SrNumber,
    CreatedDate,
    ClosedDate,
    Type,
    Status,
    Legacy,
    Address,
    Lat,
    Lon,
    X,
    Y,
}

impl LogicalField {
    pub const ALL: [LogicalField; 11] = [
        LogicalField::SrNumber,
        LogicalField::CreatedDate,
        LogicalField::ClosedDate,
        LogicalField::Type,
        LogicalField::Status,
        LogicalField::Legacy,
        LogicalField::Address,
        LogicalField::Lat,
        LogicalField::Lon,
        LogicalField::X,
        LogicalField::Y,
    ];

    /// Name used in reports
    pub fn key(self) -> &'static str {
        match self {
            LogicalField::SrNumber => "sr_number",
            LogicalField::CreatedDate => "created_date",
            LogicalField::ClosedDate => "closed_date",
            LogicalField::Type => "type",
            LogicalField::Status => "status",
            LogicalField::Legacy => "legacy",
            LogicalField::Address => "address",
            LogicalField::Lat => "lat",
            LogicalField::Lon => "lon",
            LogicalField::X => "x",
            LogicalField::Y => "y",
        }
    }

    /// Physical name variants in priority order
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            LogicalField::SrNumber => &["sr_number", "service_request_number", "srnumber", "sr_no"],
            LogicalField::CreatedDate => &[
                "created_date",
                "creation_date",
                "date_created",
                "open_date",
                "sr_created_date",
                "requested_datetime",
            ],
            LogicalField::ClosedDate => &[
                "closed_date",
                "completion_date",
                "date_closed",
                "status_date",
                "closed_datetime",
                "closed_date_time",
            ],
            LogicalField::Type => &[
                "service_request_type",
                "sr_type",
                "type_of_service_request",
                "type",
                "sr_short_description",
            ],
            LogicalField::Status => &["status", "sr_status", "current_status"],
            LogicalField::Legacy => &["legacy_record", "is_legacy_record", "legacy"],
            LogicalField::Address => &[
                "street_address",
                "address",
                "request_address",
                "location_address",
            ],
            LogicalField::Lat => &["latitude", "lat", "location_latitude"],
            LogicalField::Lon => &["longitude", "lon", "location_longitude"],
            LogicalField::X => &["x_coordinate", "xcoord", "x_coordinate_state_plane"],
            LogicalField::Y => &["y_coordinate", "ycoord", "y_coordinate_state_plane"],
        }
    }

    /// First candidate present in `columns`
    pub fn find<S: AsRef<str>>(self, columns: &[S]) -> Option<&'static str> {
        self.candidates()
            .iter()
            .copied()
            .find(|candidate| columns.iter().any(|c| c.as_ref() == *candidate))
    }
}

/// Every logical field resolved against one column set
#[derive(Debug, Clone, Default)]
pub struct ResolvedColumns {
    resolved: BTreeMap<LogicalField, &'static str>,
}

impl ResolvedColumns {
    pub fn resolve<S: AsRef<str>>(columns: &[S]) -> Self {
        let resolved = LogicalField::ALL
            .iter()
            .filter_map(|field| field.find(columns).map(|c| (*field, c)))
            .collect();
        Self { resolved }
    }

    pub fn get(&self, field: LogicalField) -> Option<&'static str> {
        self.resolved.get(&field).copied()
    }
}
