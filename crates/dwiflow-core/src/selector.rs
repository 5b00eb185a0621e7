use tracing::info;

use crate::error::SelectionError;
use crate::sequence::{AcquiredSequence, Modality};

/// Sequences chosen for one session run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceSelection {
    pub dwi: AcquiredSequence,
    /// Primary anatomical reference (T1w, or FLAIR when no T1w exists).
    pub anatomical: Option<AcquiredSequence>,
    /// Secondary sequence eligible for auxiliary coregistration.
    pub auxiliary: Option<AcquiredSequence>,
    pub pepolar: Option<AcquiredSequence>,
}

impl SequenceSelection {
    /// Whether FLAIR stands in as the primary anatomical reference.
    pub fn flair_promoted(&self) -> bool {
        self.anatomical
            .as_ref()
            .is_some_and(|a| a.modality == Modality::Flair)
    }

    /// Modalities that will take part in the run.
    pub fn found(&self) -> Vec<Modality> {
        std::iter::once(&self.dwi)
            .chain(self.anatomical.iter())
            .chain(self.auxiliary.iter())
            .chain(self.pepolar.iter())
            .map(|s| s.modality)
            .collect()
    }
}

fn at_most_one(
    sequences: &[AcquiredSequence],
    modality: Modality,
) -> Result<Option<AcquiredSequence>, SelectionError> {
    let mut matching = sequences.iter().filter(|s| s.modality == modality);
    let first = matching.next().cloned();
    let rest = matching.count();
    if rest > 0 {
        return Err(SelectionError::TooMany {
            modality,
            count: rest + 1,
        });
    }
    Ok(first)
}

/// Partition a session's sequences and enforce the cardinality rules:
/// exactly one DWI, at most one each of T1w, FLAIR and pepolar.
pub fn select_sequences(
    sequences: &[AcquiredSequence],
) -> Result<SequenceSelection, SelectionError> {
    let dwis: Vec<&AcquiredSequence> = sequences
        .iter()
        .filter(|s| s.modality == Modality::Dwi)
        .collect();
    let dwi = match dwis.as_slice() {
        [] => return Err(SelectionError::NoDiffusion),
        [one] => (*one).clone(),
        many => return Err(SelectionError::TooManyDiffusion { count: many.len() }),
    };

    let t1w = at_most_one(sequences, Modality::T1w)?;
    let flair = at_most_one(sequences, Modality::Flair)?;
    let pepolar = at_most_one(sequences, Modality::Pepolar)?;

    let (anatomical, auxiliary) = match (t1w, flair) {
        (Some(t1w), flair) => (Some(t1w), flair),
        (None, Some(flair)) => {
            info!("No T1w sequence, FLAIR promoted to anatomical reference");
            (Some(flair), None)
        }
        (None, None) => (None, None),
    };

    let selection = SequenceSelection {
        dwi,
        anatomical,
        auxiliary,
        pepolar,
    };
    info!(found = ?selection.found(), "Sequences selected");
    Ok(selection)
}
