//! `bulkhead packages` command

use anyhow::Result;

use super::context;
use crate::cli::{GlobalOpts, PackagesArgs};
use bulkhead::ops::{package_summaries, Analysis};

pub fn execute(args: PackagesArgs, global: GlobalOpts) -> Result<()> {
    let ctx = context(global, &args.input)?;
    let analysis = Analysis::load(&ctx)?;
    let summaries = package_summaries(&analysis);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    for summary in &summaries {
        match &summary.manifest {
            Some(path) => println!("{} ({})", summary.name, ctx.display_path(path)),
            None => println!("{}", summary.name),
        }
        for export in &summary.exports {
            println!("  export {}", export);
        }
        for export in &summary.test_exports {
            println!("  export_for_test {}", export);
        }
        for dep in &summary.dependencies {
            println!("  → {}", dep);
        }
        if !summary.dependents.is_empty() {
            let names: Vec<_> = summary.dependents.iter().map(|d| d.as_str()).collect();
            println!("  used by {}", names.join(", "));
        }
    }

    Ok(())
}
