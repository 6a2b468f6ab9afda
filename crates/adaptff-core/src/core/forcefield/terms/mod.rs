pub mod angle;
pub mod bond;
pub mod dihedral;
pub mod gupta;
pub mod lennard_jones;
pub mod shifter;
pub mod swg_three_body;
pub mod swg_two_body;
