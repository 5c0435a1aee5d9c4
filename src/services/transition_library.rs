use crate::models::TransitionKind;

/// Builds `-filter_complex` fragments for each transition kind, operating on
/// caller-supplied input labels (the outgoing and incoming streams, already
/// trimmed/normalized/delayed upstream) and producing a caller-supplied
/// output label. Ported from the original's ffmpeg-python transition
/// functions, expressed as filter-graph strings since the Filter Graph
/// Executor speaks raw `-filter_complex` rather than a Python DSL.
pub struct TransitionLibrary {
    bass_crossover_freq: f64,
}

impl TransitionLibrary {
    pub fn new(bass_crossover_freq: f64) -> Self {
        Self { bass_crossover_freq }
    }

    /// Builds the fragment for `kind`, given the crossfade duration `x`
    /// (seconds), the absolute `peak_time` within the outgoing stream at
    /// which bass swap's low end instantaneously swaps, and the labels of
    /// the already-prepared outgoing (`a`) and incoming (`b`) streams.
    pub fn build(&self, kind: TransitionKind, x: f64, peak_time: f64, a: &str, b: &str, out: &str) -> String {
        match kind {
            TransitionKind::Blend => Self::crossfade(a, b, x, out),
            TransitionKind::BassSwap => self.bass_swap(a, b, x, peak_time, out),
            // True animated sweeps don't survive acrossfade's per-segment
            // time reset; fall back to a plain crossfade as the original
            // implementation does.
            TransitionKind::FilterSweep => Self::crossfade(a, b, x, out),
            TransitionKind::EchoOut => Self::echo_out(a, b, x, out),
            TransitionKind::VinylStop => Self::vinyl_stop(a, b, out),
        }
    }

    fn crossfade(a: &str, b: &str, duration: f64, out: &str) -> String {
        format!("{a}{b}acrossfade=d={duration}:c1=tri:c2=tri{out}")
    }

    fn bass_swap(&self, a: &str, b: &str, duration: f64, peak_time: f64, out: &str) -> String {
        let fade_start = peak_time - duration / 2.0;
        let fade_end = peak_time + duration / 2.0;
        let freq = self.bass_crossover_freq;

        format!(
            "{a}asplit=3[a1lo0][a1hi0][a1cl];\
             [a1lo0]lowpass=f={freq},lowpass=f={freq}[a1lo];\
             [a1hi0]highpass=f={freq},highpass=f={freq}[a1hi];\
             {b}asplit=3[a2lo0][a2hi0][a2cl];\
             [a2lo0]lowpass=f={freq},lowpass=f={freq}[a2lo];\
             [a2hi0]highpass=f={freq},highpass=f={freq}[a2hi];\
             [a1hi]volume=if(between(t\\,{fade_start}\\,{fade_end})\\,({fade_end}-t)/{duration}\\,0):eval=frame[a1hiv];\
             [a1lo]volume=if(between(t\\,{fade_start}\\,{peak_time})\\,1\\,0):eval=frame[a1lov];\
             [a1cl]volume=if(lt(t\\,{fade_start})\\,1\\,0):eval=frame[a1clv];\
             [a2hi]volume=if(between(t\\,{fade_start}\\,{fade_end})\\,(t-{fade_start})/{duration}\\,0):eval=frame[a2hiv];\
             [a2lo]volume=if(between(t\\,{peak_time}\\,{fade_end})\\,1\\,0):eval=frame[a2lov];\
             [a2cl]volume=if(gt(t\\,{fade_end})\\,1\\,0):eval=frame[a2clv];\
             [a1clv][a1hiv][a1lov][a2clv][a2hiv][a2lov]amix=inputs=6:duration=longest:normalize=0{out}"
        )
    }

    fn echo_out(a: &str, b: &str, duration: f64, out: &str) -> String {
        format!("{a}aecho=0.8:0.88:500:0.5[a1echo];[a1echo]{b}acrossfade=d={duration}:c1=tri:c2=tri{out}")
    }

    fn vinyl_stop(a: &str, b: &str, out: &str) -> String {
        format!(
            "{a}afade=t=out:d=2.0[a1brake];\
             [a1brake]aecho=0.8:0.9:100:0.6[a1wash];\
             [a1wash]{b}acrossfade=d=1.0:c1=tri:c2=tri{out}"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_is_a_plain_crossfade() {
        let lib = TransitionLibrary::new(250.0);
        let graph = lib.build(TransitionKind::Blend, 10.0, 0.0, "[a1]", "[a2]", "[out]");
        assert_eq!(graph, "[a1][a2]acrossfade=d=10:c1=tri:c2=tri[out]");
    }

    #[test]
    fn bass_swap_splits_both_inputs_three_ways() {
        let lib = TransitionLibrary::new(250.0);
        let graph = lib.build(TransitionKind::BassSwap, 8.0, 30.0, "[a1]", "[a2]", "[out]");
        assert!(graph.contains("asplit=3"));
        assert!(graph.contains("lowpass=f=250"));
        assert!(graph.contains("amix=inputs=6"));
    }

    #[test]
    fn vinyl_stop_applies_fade_then_echo_then_short_crossfade() {
        let lib = TransitionLibrary::new(250.0);
        let graph = lib.build(TransitionKind::VinylStop, 10.0, 0.0, "[a1]", "[a2]", "[out]");
        assert!(graph.contains("afade=t=out:d=2.0"));
        assert!(graph.contains("acrossfade=d=1.0"));
    }
}
