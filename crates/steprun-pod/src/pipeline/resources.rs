//! Resource request consolidation
//!
//! The runtime runs steps one at a time, so the Pod only needs to request
//! the largest single-step amount of each resource. For every tracked
//! resource, the step with the largest request keeps it and every other
//! step requests zero. Ties go to the earliest step. If no step requests a
//! resource, every step requests zero of it.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use steprun_common::crd::Step;
use steprun_common::quantity::ParsedQuantity;
use tracing::warn;

/// Resources whose requests are consolidated across steps
pub const TRACKED_RESOURCES: [&str; 3] = ["cpu", "memory", "ephemeral-storage"];

/// Index of the step holding the largest request, per tracked resource
pub(crate) type MaxRequestIndices = BTreeMap<&'static str, Option<usize>>;

/// Find, per tracked resource, the step with the strictly largest request
pub(crate) fn find_max_resource_requests(steps: &[Step]) -> MaxRequestIndices {
    let mut max_indices = MaxRequestIndices::new();

    for resource in TRACKED_RESOURCES {
        let mut max_index = None;
        let mut max_request = ParsedQuantity::ZERO;

        for (index, step) in steps.iter().enumerate() {
            let Some(request) = requested(step, resource) else {
                continue;
            };
            match ParsedQuantity::from_quantity(request) {
                Ok(parsed) if parsed > max_request => {
                    max_index = Some(index);
                    max_request = parsed;
                }
                Ok(_) => {}
                Err(e) => warn!(
                    step = index,
                    resource,
                    error = %e,
                    "ignoring unparseable resource request"
                ),
            }
        }

        max_indices.insert(resource, max_index);
    }

    max_indices
}

/// Zero every tracked request this step does not hold the maximum for
pub(crate) fn zero_non_max_requests(
    step: &mut Step,
    index: usize,
    max_indices: &MaxRequestIndices,
    zero: &Quantity,
) {
    let requests = step
        .container
        .resources
        .get_or_insert_with(ResourceRequirements::default)
        .requests
        .get_or_insert_with(BTreeMap::new);

    for (resource, max_index) in max_indices {
        if *max_index != Some(index) {
            requests.insert(resource.to_string(), zero.clone());
        }
    }
}

fn requested<'a>(step: &'a Step, resource: &str) -> Option<&'a Quantity> {
    step.container
        .resources
        .as_ref()?
        .requests
        .as_ref()?
        .get(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Container;

    fn step_with_requests(requests: &[(&str, &str)]) -> Step {
        let requests: BTreeMap<String, Quantity> = requests
            .iter()
            .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
            .collect();
        Step::new(Container {
            name: "s".to_string(),
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn request(step: &Step, resource: &str) -> String {
        requested(step, resource).unwrap().0.clone()
    }

    fn consolidate(mut steps: Vec<Step>) -> Vec<Step> {
        let max = find_max_resource_requests(&steps);
        let zero = Quantity("0".to_string());
        for (i, s) in steps.iter_mut().enumerate() {
            zero_non_max_requests(s, i, &max, &zero);
        }
        steps
    }

    #[test]
    fn keeps_only_the_largest_cpu_request() {
        let steps = consolidate(vec![
            step_with_requests(&[("cpu", "100m")]),
            step_with_requests(&[("cpu", "500m")]),
            step_with_requests(&[("cpu", "200m")]),
        ]);

        let cpu: Vec<_> = steps.iter().map(|s| request(s, "cpu")).collect();
        assert_eq!(cpu, vec!["0", "500m", "0"]);

        for s in &steps {
            assert_eq!(request(s, "memory"), "0");
            assert_eq!(request(s, "ephemeral-storage"), "0");
        }
    }

    #[test]
    fn ties_keep_the_earliest_step() {
        let steps = consolidate(vec![
            step_with_requests(&[("memory", "1Gi")]),
            step_with_requests(&[("memory", "1024Mi")]),
            step_with_requests(&[("memory", "512Mi")]),
        ]);

        let memory: Vec<_> = steps.iter().map(|s| request(s, "memory")).collect();
        assert_eq!(memory, vec!["1Gi", "0", "0"]);
    }

    #[test]
    fn resources_are_consolidated_independently() {
        let steps = consolidate(vec![
            step_with_requests(&[("cpu", "2"), ("memory", "128Mi")]),
            step_with_requests(&[("cpu", "1"), ("memory", "4Gi")]),
        ]);

        assert_eq!(request(&steps[0], "cpu"), "2");
        assert_eq!(request(&steps[0], "memory"), "0");
        assert_eq!(request(&steps[1], "cpu"), "0");
        assert_eq!(request(&steps[1], "memory"), "4Gi");
    }

    #[test]
    fn steps_without_resources_get_zero_requests() {
        let steps = consolidate(vec![Step::default(), Step::default()]);

        for s in &steps {
            for resource in TRACKED_RESOURCES {
                assert_eq!(request(s, resource), "0");
            }
        }
    }

    #[test]
    fn untracked_resources_are_left_alone() {
        let steps = consolidate(vec![
            step_with_requests(&[("nvidia.com/gpu", "1")]),
            step_with_requests(&[("nvidia.com/gpu", "2")]),
        ]);

        assert_eq!(request(&steps[0], "nvidia.com/gpu"), "1");
        assert_eq!(request(&steps[1], "nvidia.com/gpu"), "2");
    }

    #[test]
    fn unparseable_requests_never_win() {
        let steps = vec![
            step_with_requests(&[("cpu", "lots")]),
            step_with_requests(&[("cpu", "100m")]),
        ];
        let max = find_max_resource_requests(&steps);
        assert_eq!(max.get("cpu"), Some(&Some(1)));
    }

    #[test]
    fn zero_requests_do_not_become_the_maximum() {
        let steps = vec![step_with_requests(&[("cpu", "0")])];
        let max = find_max_resource_requests(&steps);
        assert_eq!(max.get("cpu"), Some(&None));
    }

    #[test]
    fn limits_are_untouched() {
        let mut s = step_with_requests(&[("cpu", "1")]);
        s.container.resources.as_mut().unwrap().limits = Some(BTreeMap::from([(
            "cpu".to_string(),
            Quantity("2".to_string()),
        )]));
        let steps = consolidate(vec![Step::default(), s]);
        let limits = steps[1].container.resources.as_ref().unwrap().limits.as_ref().unwrap();
        assert_eq!(limits.get("cpu").unwrap().0, "2");
        assert_eq!(request(&steps[1], "cpu"), "1");
    }
}
