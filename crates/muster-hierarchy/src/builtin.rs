//! Built-in five-branch catalog.
//!
//! Designator ranges are engineered so that mid-level collisions exist
//! between the ground branches (shared `division` values) and between the
//! naval and air branches (shared `squadron` values), while each branch
//! keeps at least one level name of its own to act as a structural
//! discriminator.

/// Default hierarchy definition, parseable by [`crate::Hierarchy::from_toml_str`].
pub const BUILTIN_HIERARCHY_TOML: &str = r#"
[branches.infantry]
depth = 4
levels = ["sector", "division", "regiment", "company"]
branch_unique_terms = ["regiment", "company"]

[branches.infantry.valid_designators]
sector = [1, 2, 3, 4, 5, 6]
division = [1, 2, 3, 4, 5, 6, 7, 8, 9]
regiment = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
company = ["A", "B", "C", "D", "E", "F"]

[branches.artillery]
depth = 4
levels = ["sector", "division", "battery", "gun"]
branch_unique_terms = ["battery", "gun"]

[branches.artillery.valid_designators]
sector = [1, 2, 3, 4, 5, 6]
division = [7, 8, 9, 10, 11, 12]
battery = [1, 2, 3, 4, 5, 6, 7, 8]
gun = ["A", "B", "C", "D"]

[branches.cavalry]
depth = 3
levels = ["sector", "division", "troop"]
branch_unique_terms = ["troop"]

[branches.cavalry.valid_designators]
sector = [1, 2, 3, 4, 5, 6]
division = [1, 2, 3, 15, 16]
troop = ["A", "B", "C", "D", "E", "F", "G", "H"]

[branches.naval]
depth = 5
levels = ["sector", "flotilla", "squadron", "vessel", "station"]
branch_unique_terms = ["flotilla", "vessel", "station"]

[branches.naval.valid_designators]
sector = [1, 2, 3, 4, 5, 6]
flotilla = [1, 2, 3, 4, 5]
squadron = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]
vessel = [11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30]
station = ["A", "B", "C"]

[branches.air]
depth = 4
levels = ["sector", "wing", "squadron", "flight"]
branch_unique_terms = ["wing", "flight"]

[branches.air.valid_designators]
sector = [1, 2, 3, 4, 5, 6]
wing = [1, 2, 3, 4, 5, 6]
squadron = [8, 9, 10, 11, 12, 13, 14]
flight = ["A", "B", "C", "D"]
"#;
