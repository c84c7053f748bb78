//! Pattern prober (G): tests Cartesian products of version x resource
//! templates against five common URL shapes.

use indexmap::IndexSet;

/// Generates the five templated paths for every `(version, resource)` pair,
/// deduplicated in generation order.
#[must_use]
pub fn generate_candidates(versions: &[u32], resources: &[String]) -> Vec<String> {
    let mut candidates = IndexSet::new();
    for version in versions {
        for resource in resources {
            candidates.insert(format!("/api/v{version}/{resource}"));
            candidates.insert(format!("/v{version}/{resource}"));
        }
    }
    for resource in resources {
        candidates.insert(format!("/{resource}"));
        candidates.insert(format!("/{resource}/1"));
        candidates.insert(format!("/api/{resource}"));
    }
    candidates.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_all_five_templates_per_resource() {
        let candidates = generate_candidates(&[1], &["users".to_string()]);
        assert!(candidates.contains(&"/api/v1/users".to_string()));
        assert!(candidates.contains(&"/v1/users".to_string()));
        assert!(candidates.contains(&"/users".to_string()));
        assert!(candidates.contains(&"/users/1".to_string()));
        assert!(candidates.contains(&"/api/users".to_string()));
    }

    #[test]
    fn is_a_cartesian_product_over_versions() {
        let candidates = generate_candidates(&[1, 2], &["users".to_string()]);
        assert!(candidates.contains(&"/api/v1/users".to_string()));
        assert!(candidates.contains(&"/api/v2/users".to_string()));
    }

    #[test]
    fn deduplicates_candidates() {
        let candidates = generate_candidates(&[1], &["users".to_string(), "users".to_string()]);
        let count = candidates.iter().filter(|c| *c == "/users").count();
        assert_eq!(count, 1);
    }
}
