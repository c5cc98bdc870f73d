use crate::models::Bias;

/// Multi-timeframe concordance, 0..=3.
///
/// One point for each of (h4, h1), (h4, m15), (h1, m15) that agree on a
/// direction. RANGE is not a direction: two RANGE readings never agree.
pub fn score_alignment(h4: Bias, h1: Bias, m15: Bias) -> u8 {
    let agree = |a: Bias, b: Bias| a == b && a.is_directional();

    let mut score = 0;
    if agree(h4, h1) {
        score += 1;
    }
    if agree(h4, m15) {
        score += 1;
    }
    if agree(h1, m15) {
        score += 1;
    }
    score
}
