//! Pure segment-continuity math. No I/O: every function here
//! takes durations and policy knobs and returns the timeline a segment must
//! be built to, so that segments emitted back-to-back reproduce a
//! continuous mix, expressed as free functions over a params struct rather
//! than inline script variables.

#[derive(Debug, Clone, Copy)]
pub struct ContinuityParams {
    pub lead_in: f64,
    pub b_end_buffer: f64,
    pub overlap: f64,
    pub v_off: f64,
}

/// The resolved timeline for a steady-state segment (one with a real A
/// track preceding B).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteadySegmentPlan {
    pub x: f64,
    pub t_trans_a: f64,
    pub t_start_a: f64,
    pub l_a_seg: f64,
    pub tau_x: f64,
    pub delay_ms: i64,
    pub handoff_b: f64,
    pub t_b_end: f64,
    pub d_seg: f64,
}

/// Clamps a requested crossfade length into `[0.05, min(T_A, T_B) - 0.05]`.
pub fn clamp_crossfade(x_requested: f64, t_a: f64, t_b: f64) -> f64 {
    let upper = (t_a.min(t_b) - 0.05).max(0.05);
    x_requested.clamp(0.05, upper)
}

/// Resolves `t_trans_A`: the requested value (or the default `T_A - B_end -
/// X`) clamped to `[20, T_A - X]`. Returns whether clamping actually moved
/// the value, so callers can log an edge-case warning when it does.
pub fn resolve_t_trans_a(
    requested: Option<f64>,
    t_a: f64,
    b_end_buffer: f64,
    x: f64,
) -> (f64, bool) {
    let default = t_a - b_end_buffer - x;
    let raw = requested.unwrap_or(default);
    let upper = (t_a - x).max(20.0);
    let clamped = raw.clamp(20.0, upper);
    (clamped, (clamped - raw).abs() > f64::EPSILON)
}

/// Builds the full steady-segment timeline given resolved `X` and
/// `t_trans_A` (already clamped by the two functions above).
pub fn build_steady_plan(
    t_a: f64,
    t_b: f64,
    x: f64,
    t_trans_a: f64,
    params: &ContinuityParams,
) -> SteadySegmentPlan {
    let t_start_a = t_trans_a - params.lead_in;
    let l_a_seg = t_a - t_start_a;
    let tau_x = params.lead_in;

    let delay_ms = ((tau_x - params.overlap / 2.0) * 1000.0).round().max(0.0) as i64;
    let delay_s = delay_ms as f64 / 1000.0;

    let handoff_b = ((t_b - params.b_end_buffer) - params.lead_in).max(0.0);
    let t_b_end = t_b.min(handoff_b + params.overlap);

    let d_seg = l_a_seg.max(delay_s + t_b_end);

    SteadySegmentPlan {
        x,
        t_trans_a,
        t_start_a,
        l_a_seg,
        tau_x,
        delay_ms,
        handoff_b,
        t_b_end,
        d_seg,
    }
}

/// `handoff_gap = handoff_B - t_B_end`, both computed within the same
/// segment's plan (`handoff_B` is the B-time at which the *next* segment
/// will begin carrying this B as its own A; `t_B_end` is where this
/// segment truncates B). Should be `<= 0`; a positive value is a non-fatal
/// warning condition, not a contract violation worth failing the render
/// over.
pub fn handoff_gap(plan: &SteadySegmentPlan) -> f64 {
    plan.handoff_b - plan.t_b_end
}

/// Bootstrap segment's B-trim point: normally `T_B - B_end`, but if that's
/// under 60 s (i.e. B is a very short track) fall back to `T_B - 15`
/// instead.
pub fn bootstrap_b_trim(t_b: f64, b_end_buffer: f64) -> f64 {
    let trim = t_b - b_end_buffer;
    if trim < 60.0 {
        t_b - 15.0
    } else {
        trim
    }
}

/// Voice ducking timing: when the voice track starts relative to the
/// segment, and the window during which music is ducked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceTiming {
    pub delay_ms: i64,
    pub t_v_start: f64,
    pub t_v_end: f64,
}

pub fn voice_timing(tau_x: f64, v_off: f64, voice_duration_s: f64) -> VoiceTiming {
    let delay_ms = ((tau_x - v_off) * 1000.0).round().max(0.0) as i64;
    let t_v_start = tau_x - v_off;
    VoiceTiming {
        delay_ms,
        t_v_start,
        t_v_end: t_v_start + voice_duration_s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ContinuityParams {
        ContinuityParams {
            lead_in: 12.0,
            b_end_buffer: 20.0,
            overlap: 0.75,
            v_off: 5.0,
        }
    }

    #[test]
    fn crossfade_clamps_to_shorter_track_minus_margin() {
        assert_eq!(clamp_crossfade(10.0, 200.0, 180.0), 10.0);
        assert_eq!(clamp_crossfade(500.0, 200.0, 180.0), 179.95);
        assert_eq!(clamp_crossfade(0.0, 200.0, 180.0), 0.05);
    }

    #[test]
    fn t_trans_a_defaults_to_t_a_minus_buffer_minus_x() {
        let (t_trans_a, clamped) = resolve_t_trans_a(None, 200.0, 20.0, 10.0);
        assert_eq!(t_trans_a, 170.0);
        assert!(!clamped);
    }

    #[test]
    fn t_trans_a_clamps_when_forced_below_twenty_seconds() {
        let (t_trans_a, clamped) = resolve_t_trans_a(Some(5.0), 40.0, 20.0, 10.0);
        assert_eq!(t_trans_a, 20.0);
        assert!(clamped);
    }

    #[test]
    fn builds_expected_steady_timeline() {
        let p = params();
        let x = clamp_crossfade(10.0, 200.0, 180.0);
        let (t_trans_a, _) = resolve_t_trans_a(None, 200.0, p.b_end_buffer, x);
        let plan = build_steady_plan(200.0, 180.0, x, t_trans_a, &p);

        assert_eq!(plan.t_trans_a, 170.0);
        assert_eq!(plan.t_start_a, 158.0);
        assert_eq!(plan.l_a_seg, 42.0);
        assert_eq!(plan.tau_x, 12.0);
        assert_eq!(plan.delay_ms, 11625);
        assert_eq!(plan.handoff_b, 148.0);
        assert_eq!(plan.t_b_end, 148.75);
        assert!((plan.d_seg - 160.375).abs() < 1e-9);
    }

    #[test]
    fn handoff_gap_is_non_positive_in_the_steady_case() {
        let p = params();
        let x = clamp_crossfade(10.0, 200.0, 180.0);
        let (t_trans_a, _) = resolve_t_trans_a(None, 200.0, p.b_end_buffer, x);
        let plan = build_steady_plan(200.0, 180.0, x, t_trans_a, &p);

        assert!(handoff_gap(&plan) <= 0.0);
    }

    #[test]
    fn bootstrap_trim_falls_back_for_short_tracks() {
        assert_eq!(bootstrap_b_trim(200.0, 20.0), 180.0);
        assert_eq!(bootstrap_b_trim(50.0, 20.0), 35.0);
    }

    #[test]
    fn voice_timing_clamps_delay_to_zero() {
        let t = voice_timing(12.0, 5.0, 8.0);
        assert_eq!(t.delay_ms, 7000);
        assert_eq!(t.t_v_start, 7.0);
        assert_eq!(t.t_v_end, 15.0);

        let clamped = voice_timing(3.0, 5.0, 8.0);
        assert_eq!(clamped.delay_ms, 0);
    }
}
