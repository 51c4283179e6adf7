use crate::rendition::RenditionLadder;

/// Buffer-health and headroom cutoffs for the quality decision.
///
/// The thresholds are asymmetric (10% panic floor, 30% upshift cushion) and
/// the upshift additionally demands 50% throughput headroom, so a marginal
/// link settles on one rendition instead of oscillating.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveThresholds {
    /// Buffer health below this switches down one step.
    pub downshift_buffer_health: f64,
    /// Buffer health above this allows considering a step up.
    pub upshift_buffer_health: f64,
    /// Estimated throughput must exceed `candidate bitrate * this factor`
    /// before stepping up.
    pub upshift_headroom: f64,
}

impl Default for AdaptiveThresholds {
    fn default() -> Self {
        Self {
            downshift_buffer_health: 0.10,
            upshift_buffer_health: 0.30,
            upshift_headroom: 1.5,
        }
    }
}

/// Outcome of one evaluation cycle. Targets are ladder indices and always
/// one step from the current index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityDecision {
    Hold,
    StepDown { target: usize },
    StepUp { target: usize },
}

/// Decide whether the active rendition should change.
///
/// Downshifting takes priority over upshifting and ignores throughput: an
/// emptying buffer is acted on even when the estimate looks good. An
/// unknown throughput (`None`) never upshifts.
pub fn evaluate_quality(
    current: usize,
    ladder: &RenditionLadder,
    buffer_health: f64,
    throughput_bps: Option<u64>,
    thresholds: &AdaptiveThresholds,
) -> QualityDecision {
    if buffer_health < thresholds.downshift_buffer_health {
        if let Some(target) = ladder.down_from(current) {
            return QualityDecision::StepDown { target };
        }
        return QualityDecision::Hold;
    }

    if buffer_health > thresholds.upshift_buffer_health
        && let Some(target) = ladder.up_from(current)
        && let Some(candidate) = ladder.get(target)
        && let Some(bps) = throughput_bps
        && bps as f64 > thresholds.upshift_headroom * candidate.bitrate_bps as f64
    {
        return QualityDecision::StepUp { target };
    }

    QualityDecision::Hold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendition::Rendition;

    fn ladder() -> RenditionLadder {
        let rendition = |id: &str, bitrate_bps: u64| Rendition {
            id: id.to_string(),
            label: id.to_string(),
            bitrate_bps,
            url: format!("https://cdn.example/{id}.m3u8"),
            is_default: false,
        };
        RenditionLadder::new(vec![
            rendition("240p", 500_000),
            rendition("480p", 1_200_000),
            rendition("1080p", 4_000_000),
        ])
        .unwrap()
    }

    #[test]
    fn low_buffer_steps_down_one_rendition() {
        let decision = evaluate_quality(1, &ladder(), 0.05, None, &AdaptiveThresholds::default());
        assert_eq!(decision, QualityDecision::StepDown { target: 0 });
    }

    #[test]
    fn low_buffer_steps_down_regardless_of_throughput() {
        let decision = evaluate_quality(
            2,
            &ladder(),
            0.05,
            Some(50_000_000),
            &AdaptiveThresholds::default(),
        );
        assert_eq!(decision, QualityDecision::StepDown { target: 1 });
    }

    #[test]
    fn lowest_rendition_holds_under_pressure() {
        let decision = evaluate_quality(0, &ladder(), 0.02, None, &AdaptiveThresholds::default());
        assert_eq!(decision, QualityDecision::Hold);
    }

    #[test]
    fn insufficient_headroom_holds() {
        // headroom to 1080p = 2_500_000 / 4_000_000 = 0.625
        let decision = evaluate_quality(
            1,
            &ladder(),
            0.35,
            Some(2_500_000),
            &AdaptiveThresholds::default(),
        );
        assert_eq!(decision, QualityDecision::Hold);
    }

    #[test]
    fn ample_headroom_steps_up_one_rendition() {
        // headroom to 1080p = 7_000_000 / 4_000_000 = 1.75
        let decision = evaluate_quality(
            1,
            &ladder(),
            0.35,
            Some(7_000_000),
            &AdaptiveThresholds::default(),
        );
        assert_eq!(decision, QualityDecision::StepUp { target: 2 });
    }

    #[test]
    fn headroom_must_strictly_exceed_factor() {
        let decision = evaluate_quality(
            1,
            &ladder(),
            0.35,
            Some(6_000_000),
            &AdaptiveThresholds::default(),
        );
        assert_eq!(decision, QualityDecision::Hold);
    }

    #[test]
    fn unknown_throughput_never_upshifts() {
        let decision = evaluate_quality(0, &ladder(), 0.9, None, &AdaptiveThresholds::default());
        assert_eq!(decision, QualityDecision::Hold);
    }

    #[test]
    fn highest_rendition_has_nowhere_to_go() {
        let decision = evaluate_quality(
            2,
            &ladder(),
            0.9,
            Some(50_000_000),
            &AdaptiveThresholds::default(),
        );
        assert_eq!(decision, QualityDecision::Hold);
    }

    #[test]
    fn threshold_boundaries_hold() {
        let thresholds = AdaptiveThresholds::default();
        // Exactly at the downshift floor is not below it.
        assert_eq!(
            evaluate_quality(1, &ladder(), 0.10, Some(50_000_000), &thresholds),
            QualityDecision::Hold
        );
        // Exactly at the upshift cushion is not above it.
        assert_eq!(
            evaluate_quality(1, &ladder(), 0.30, Some(50_000_000), &thresholds),
            QualityDecision::Hold
        );
    }

    #[test]
    fn decision_is_never_more_than_one_step() {
        let ladder = ladder();
        let thresholds = AdaptiveThresholds::default();
        for current in 0..ladder.len() {
            for health in [0.0, 0.05, 0.2, 0.35, 1.0] {
                let decision =
                    evaluate_quality(current, &ladder, health, Some(100_000_000), &thresholds);
                match decision {
                    QualityDecision::Hold => {}
                    QualityDecision::StepDown { target } => assert_eq!(target, current - 1),
                    QualityDecision::StepUp { target } => assert_eq!(target, current + 1),
                }
            }
        }
    }
}
