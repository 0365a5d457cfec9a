//! Confidence decision policy over raw class scores

/// Outcome of applying the policy to one score vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Index of the top-scoring class
    pub top_index: usize,
    /// Top score clamped to [0, 1]
    pub confidence: f32,
    /// Gap between the top two raw scores
    pub margin: f32,
    /// Threshold and margin both satisfied
    pub meets_threshold: bool,
}

/// Threshold and margin rules deciding whether a classification is actionable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    /// Minimum top-class confidence
    pub threshold: f64,
    /// Minimum gap between the top two scores
    pub margin: f64,
}

impl DecisionPolicy {
    pub fn new(threshold: f64, margin: f64) -> Self {
        Self { threshold, margin }
    }

    /// Apply the policy to a score vector.
    ///
    /// Returns `None` for an empty vector. Equal top scores resolve to the
    /// lowest index.
    pub fn decide(&self, scores: &[f32]) -> Option<Decision> {
        let top_index = Self::argmax(scores)?;
        let top = scores[top_index];
        let confidence = top.clamp(0.0, 1.0);

        let second = scores
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != top_index)
            .map(|(_, &s)| s)
            .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))));
        let margin = second.map_or(top, |second| top - second);

        let mut meets_threshold = f64::from(confidence) >= self.threshold;
        if meets_threshold && second.is_some() {
            meets_threshold = f64::from(margin) >= self.margin;
        }

        Some(Decision {
            top_index,
            confidence,
            margin,
            meets_threshold,
        })
    }

    /// Index of the highest score, first occurrence on ties
    pub fn argmax(scores: &[f32]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &score) in scores.iter().enumerate() {
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((i, score)),
            }
        }
        best.map(|(i, _)| i)
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(0.50, 0.30)
    }
}
