//! The full open, map, probe, enumerate and release pipeline.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, info_span};

use crate::config::{ProbeConfig, ProbeSettings};
use crate::error::Result;
use crate::formats::{ExeInfo, Format, Object};
use crate::io::MappedInput;
use crate::probe::Prober;
use crate::sections::{enumerate, SectionRecord};

/// Summary of a completed inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub format: Format,
    pub info: ExeInfo,
    /// Number of sections passed to the visitor.
    pub sections: usize,
}

/// Inspect the file at `path`, calling `visitor` once per section as it is
/// enumerated.
///
/// Resources are acquired as descriptor, mapping, object and released in the
/// reverse order on every path, including when probing, enumeration or the
/// visitor fails. Records already handed to the visitor stay valid when a
/// later section fails.
pub fn inspect_path<P, F>(path: P, config: &ProbeConfig, visitor: F) -> Result<Inspection>
where
    P: AsRef<Path>,
    F: FnMut(&SectionRecord<'_>) -> Result<()>,
{
    let path = path.as_ref();
    let _span = info_span!("inspect", path = %path.display()).entered();

    let mut input = MappedInput::acquire_with(path, &config.io)?;
    inspect_mapped(&mut input, &config.probe, visitor)
}

/// Probe and enumerate an already acquired input, then release it.
///
/// The object is released before the mapping, and the mapping before its
/// descriptor. `input` is released whether or not probing succeeds.
pub fn inspect_mapped<F>(
    input: &mut MappedInput,
    settings: &ProbeSettings,
    mut visitor: F,
) -> Result<Inspection>
where
    F: FnMut(&SectionRecord<'_>) -> Result<()>,
{
    let prober = Prober::from_settings(settings);
    let outcome = match prober.probe_input(input) {
        Ok(mut object) => {
            let outcome = walk(&object, &mut visitor);
            object.release();
            outcome
        }
        Err(e) => Err(e),
    };

    input.release();
    debug!(ok = outcome.is_ok(), "Released input");
    outcome
}

fn walk<F>(object: &Object<'_>, visitor: &mut F) -> Result<Inspection>
where
    F: FnMut(&SectionRecord<'_>) -> Result<()>,
{
    let info = object.info()?;
    let mut sections = 0;
    for record in enumerate(object) {
        visitor(&record?)?;
        sections += 1;
    }
    Ok(Inspection {
        format: object.format(),
        info,
        sections,
    })
}
