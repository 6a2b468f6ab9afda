use crate::cli::BoundsArgs;
use crate::error::Result;
use adaptff::core::params::bounds::ParameterBounds;
use adaptff::core::params::store::ParameterStore;
use adaptff::engine::error::EngineError;
use adaptff::engine::forcefield::ForceField;
use std::io::Write;

pub fn run(args: BoundsArgs) -> Result<()> {
    let params = ParameterStore::load(&args.params).map_err(EngineError::from)?;
    let method = args.method.as_deref().unwrap_or(params.method());
    let forcefield = ForceField::from_method(method)?;
    let bounds = forcefield.bounds(&params);

    let mut stdout = std::io::stdout().lock();
    write_table(&mut stdout, &params, &bounds)?;
    Ok(())
}

/// One `key  index  lower  upper` line per parameter position.
fn write_table(
    out: &mut impl Write,
    params: &ParameterStore,
    bounds: &ParameterBounds,
) -> Result<()> {
    for key in params.keys() {
        let Some(slice) = params.slice(key) else {
            continue;
        };
        for (index, position) in slice.range().enumerate() {
            writeln!(
                out,
                "{key}\t{index}\t{}\t{}",
                bounds.lower()[position],
                bounds.upper()[position]
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_every_parameter_with_its_bounds() {
        let params = ParameterStore::new(
            "amberff:totalshift",
            [("amberlj:C", 2), ("totalenergyshifter:C", 1), ("custom:X", 1)],
        )
        .unwrap();
        let forcefield = ForceField::from_method(params.method()).unwrap();
        let bounds = forcefield.bounds(&params);

        let mut buffer = Vec::new();
        write_table(&mut buffer, &params, &bounds).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "amberlj:C\t0\t-0.01\t0.01",
                "amberlj:C\t1\t0\t15",
                "totalenergyshifter:C\t0\t-100\t0",
                "custom:X\t0\t-inf\tinf",
            ]
        );
    }
}
