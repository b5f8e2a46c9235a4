//! Backend listing command.

use anyhow::Result;

pub fn run() -> Result<()> {
    println!("Execution backends:");
    print!("{}", sobel_compute::describe_backends());
    Ok(())
}
