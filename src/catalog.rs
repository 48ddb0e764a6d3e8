use rand::Rng;

/// Fixed catalog of request titles.
const REQUEST_TITLES: &[&str] = &[
    "Benchmark inference latency across provider tiers",
    "Summarize this week's governance proposals",
    "Draft onboarding notes for new contributors",
    "Compare rollup data availability costs",
    "Collect failure cases for the staking dashboard",
    "Review rate limits on the public gateway",
    "Outline a migration plan for the indexer",
    "Audit webhook retry behavior under load",
    "Catalog open questions from the community call",
    "Survey wallet compatibility issues",
];

/// Fixed catalog of request bodies.
const REQUEST_BODIES: &[&str] = &[
    "Looking for recent data points and a short writeup. Links to sources appreciated.",
    "A rough first pass is fine, we can iterate on structure later.",
    "Please keep the summary under a page and flag anything that needs follow-up.",
    "Interested in both the happy path and the edge cases here.",
    "Context is in the linked thread; the goal is a checklist we can act on.",
    "No strict deadline, but earlier is better for planning purposes.",
];

const AGENT_NAME_PREFIXES: &[&str] = &[
    "atlas", "beacon", "cinder", "drift", "ember", "fable", "garnet", "harbor", "iris", "juniper",
];

const AGENT_NAME_SUFFIXES: &[&str] = &[
    "scout", "relay", "scribe", "sentry", "runner", "keeper",
];

const AGENT_DESCRIPTIONS: &[&str] = &[
    "Watches configured feeds and surfaces items matching saved filters.",
    "Summarizes long-running threads into a daily digest.",
    "Tracks task boards and nudges on stale items.",
    "Collects metrics snapshots and posts anomalies.",
    "Answers routine questions from a curated knowledge base.",
    "Routes incoming requests to the right queue.",
];

fn pick<'a>(items: &[&'a str]) -> &'a str {
    let mut rng = rand::thread_rng();
    items[rng.gen_range(0..items.len())]
}

pub fn random_title() -> String {
    pick(REQUEST_TITLES).to_string()
}

pub fn random_body() -> String {
    pick(REQUEST_BODIES).to_string()
}

/// Agent names carry a numeric tail so repeat cycles don't collide on the
/// service's uniqueness check.
pub fn random_agent_name() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "{}-{}-{:03}",
        pick(AGENT_NAME_PREFIXES),
        pick(AGENT_NAME_SUFFIXES),
        rng.gen_range(0..1000)
    )
}

pub fn random_agent_description() -> String {
    pick(AGENT_DESCRIPTIONS).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_come_from_the_catalog() {
        for _ in 0..20 {
            assert!(REQUEST_TITLES.contains(&random_title().as_str()));
            assert!(REQUEST_BODIES.contains(&random_body().as_str()));
            assert!(AGENT_DESCRIPTIONS.contains(&random_agent_description().as_str()));
        }
    }

    #[test]
    fn agent_names_have_numeric_tail() {
        for _ in 0..20 {
            let name = random_agent_name();
            let parts: Vec<&str> = name.split('-').collect();
            assert_eq!(parts.len(), 3);
            assert!(AGENT_NAME_PREFIXES.contains(&parts[0]));
            assert!(AGENT_NAME_SUFFIXES.contains(&parts[1]));
            assert!(parts[2].parse::<u32>().is_ok());
        }
    }
}
