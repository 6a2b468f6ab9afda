use super::load_geometries;
use crate::cli::StubArgs;
use crate::error::Result;
use adaptff::engine::error::EngineError;
use adaptff::engine::forcefield::ForceField;
use tracing::info;

pub fn run(args: StubArgs) -> Result<()> {
    let forcefield = ForceField::from_method(&args.method)?;
    let topologies: Vec<_> = load_geometries(&args.geometries)?
        .into_iter()
        .map(|g| g.topology)
        .collect();

    let stub = forcefield.parameter_stub(&topologies)?;
    info!(
        "Generated {} keys ({} parameters) for method '{}'.",
        stub.number_of_keys(),
        stub.len(),
        stub.method()
    );
    stub.save(&args.output).map_err(EngineError::from)?;
    println!(
        "Parameter stub with {} keys written to: {}",
        stub.number_of_keys(),
        args.output.display()
    );
    Ok(())
}
