/// Per-frame audio features for the main body, aligned to the video frame rate.
///
/// All three arrays always have the same length; [`FeatureFrameSet::from_parts`]
/// truncates to the shortest when extraction rounding leaves them uneven.
#[derive(Clone, Debug, Default)]
pub struct FeatureFrameSet {
    /// Peak absolute sample per frame (0.0-1.0)
    amplitude: Vec<f32>,
    /// Mel band energies per frame, normalized over the clip (0.0-1.0)
    bands: Vec<Vec<f32>>,
    /// Fixed-length raw sample descriptor per frame
    waveform: Vec<Vec<f32>>,
}

/// Borrowed view of one feature frame.
#[derive(Clone, Copy, Debug)]
pub struct FeatureFrame<'a> {
    pub amplitude: f32,
    pub bands: &'a [f32],
    pub waveform: &'a [f32],
}

impl FeatureFrameSet {
    pub fn from_parts(
        mut amplitude: Vec<f32>,
        mut bands: Vec<Vec<f32>>,
        mut waveform: Vec<Vec<f32>>,
    ) -> Self {
        let n = amplitude.len().min(bands.len()).min(waveform.len());
        if amplitude.len() != n || bands.len() != n || waveform.len() != n {
            log::debug!(
                "Truncating feature arrays to {} frames (amplitude={}, bands={}, waveform={})",
                n,
                amplitude.len(),
                bands.len(),
                waveform.len()
            );
        }
        amplitude.truncate(n);
        bands.truncate(n);
        waveform.truncate(n);
        Self {
            amplitude,
            bands,
            waveform,
        }
    }

    pub fn len(&self) -> usize {
        self.amplitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitude.is_empty()
    }

    pub fn n_bands(&self) -> usize {
        self.bands.first().map_or(0, Vec::len)
    }

    /// Frame at `index`, clamped into range. Panics on an empty set.
    pub fn frame(&self, index: usize) -> FeatureFrame<'_> {
        let i = index.min(self.len().saturating_sub(1));
        FeatureFrame {
            amplitude: self.amplitude[i],
            bands: &self.bands[i],
            waveform: &self.waveform[i],
        }
    }

    pub fn amplitude(&self) -> &[f32] {
        &self.amplitude
    }

    pub fn bands(&self) -> &[Vec<f32>] {
        &self.bands
    }

    pub fn waveform(&self) -> &[Vec<f32>] {
        &self.waveform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_shortest() {
        let set = FeatureFrameSet::from_parts(
            vec![0.1, 0.2, 0.3],
            vec![vec![0.0; 4]; 4],
            vec![vec![0.0; 8]; 3],
        );
        assert_eq!(set.len(), 3);
        assert_eq!(set.bands().len(), 3);
        assert_eq!(set.waveform().len(), 3);
        assert_eq!(set.n_bands(), 4);
    }

    #[test]
    fn frame_clamps_index() {
        let set = FeatureFrameSet::from_parts(
            vec![0.1, 0.9],
            vec![vec![0.5], vec![0.7]],
            vec![vec![0.0], vec![1.0]],
        );
        assert_eq!(set.frame(1).amplitude, 0.9);
        assert_eq!(set.frame(50).amplitude, 0.9);
        assert_eq!(set.frame(0).bands, &[0.5]);
    }
}
