//! Bundled region table, used whenever the live reference document cannot be
//! fetched or parsed.

/// Number of regions in [`EMBEDDED_REGIONS`].
pub const EMBEDDED_REGION_COUNT: usize = 169;

/// Number of parent areas in [`EMBEDDED_REGIONS`].
pub const EMBEDDED_AREA_COUNT: usize = 8;

/// Connecticut towns grouped by county.
pub(crate) const EMBEDDED_REGIONS: &[(&str, &[&str])] = &[
    (
        "Fairfield",
        &[
            "Bethel", "Bridgeport", "Brookfield", "Danbury", "Darien", "Easton", "Fairfield",
            "Greenwich", "Monroe", "New Canaan", "New Fairfield", "Newtown", "Norwalk", "Redding",
            "Ridgefield", "Shelton", "Sherman", "Stamford", "Stratford", "Trumbull", "Weston",
            "Westport", "Wilton",
        ],
    ),
    (
        "Hartford",
        &[
            "Avon", "Berlin", "Bloomfield", "Bristol", "Burlington", "Canton", "East Granby",
            "East Hartford", "East Windsor", "Enfield", "Farmington", "Glastonbury", "Granby",
            "Hartford", "Hartland", "Manchester", "Marlborough", "New Britain", "Newington",
            "Plainville", "Rocky Hill", "Simsbury", "South Windsor", "Southington", "Suffield",
            "West Hartford", "Wethersfield", "Windsor", "Windsor Locks",
        ],
    ),
    (
        "Litchfield",
        &[
            "Barkhamsted", "Bethlehem", "Bridgewater", "Canaan", "Colebrook", "Cornwall", "Goshen",
            "Harwinton", "Kent", "Litchfield", "Morris", "New Hartford", "New Milford", "Norfolk",
            "North Canaan", "Plymouth", "Roxbury", "Salisbury", "Sharon", "Thomaston",
            "Torrington", "Warren", "Washington", "Watertown", "Winchester", "Woodbury",
        ],
    ),
    (
        "Middlesex",
        &[
            "Chester", "Clinton", "Cromwell", "Deep River", "Durham", "East Haddam",
            "East Hampton", "Essex", "Haddam", "Killingworth", "Middlefield", "Middletown",
            "Old Saybrook", "Portland", "Westbrook",
        ],
    ),
    (
        "New Haven",
        &[
            "Ansonia", "Beacon Falls", "Bethany", "Branford", "Cheshire", "Derby", "East Haven",
            "Guilford", "Hamden", "Madison", "Meriden", "Middlebury", "Milford", "Naugatuck",
            "New Haven", "North Branford", "North Haven", "Orange", "Oxford", "Prospect",
            "Seymour", "Southbury", "Wallingford", "Waterbury", "West Haven", "Wolcott",
            "Woodbridge",
        ],
    ),
    (
        "New London",
        &[
            "Bozrah", "Colchester", "East Lyme", "Franklin", "Griswold", "Groton", "Lebanon",
            "Ledyard", "Lisbon", "Lyme", "Montville", "New London", "North Stonington", "Norwich",
            "Old Lyme", "Preston", "Salem", "Sprague", "Stonington", "Voluntown", "Waterford",
        ],
    ),
    (
        "Tolland",
        &[
            "Andover", "Bolton", "Columbia", "Coventry", "Ellington", "Hebron", "Mansfield",
            "Somers", "Stafford", "Tolland", "Union", "Vernon", "Willington",
        ],
    ),
    (
        "Windham",
        &[
            "Ashford", "Brooklyn", "Canterbury", "Chaplin", "Eastford", "Hampton", "Killingly",
            "Plainfield", "Pomfret", "Putnam", "Scotland", "Sterling", "Thompson", "Windham",
            "Woodstock",
        ],
    ),
];

/// County names used by the alternative parsing pass.
pub(crate) fn known_areas() -> impl Iterator<Item = &'static str> {
    EMBEDDED_REGIONS.iter().map(|(area, _)| *area)
}
