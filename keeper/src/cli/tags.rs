use std::path::Path;

use itertools::Itertools;

use crate::{
    catalog::Catalog,
    instance::{self, Defaults, Instance},
    upstream::{CommitCache, Pinned},
    Result,
};

pub fn tags(catalog: &Path) -> Result<()> {
    use comfy_table::{Attribute, Cell, ContentArrangement, Table};

    let catalog = Catalog::load(catalog)?;

    // Upstream commits are not resolved, `{defaults[commit]}` renders as `HEAD`.
    let pinned = Pinned("HEAD".to_owned());
    let instances = instance::expand(&catalog, &Defaults::now()?, &mut CommitCache::new(&pinned))?;

    // Function pointers, so that every closure of the array has the same type.
    type Accessor = fn(&Instance) -> String;

    fn accessor(f: Accessor) -> Accessor {
        f
    }

    let columns = [
        ("image", accessor(|instance| format!("images[{}]", instance.entry))),
        ("matrix", accessor(|instance| instance.matrix.to_string())),
        ("tags", accessor(|instance| instance.tags.iter().join("\n"))),
        ("Dockerfile", accessor(|instance| instance.path.clone())),
        ("keywords", accessor(|instance| instance.keywords.iter().join(", "))),
        ("nightly", accessor(|instance| (if instance.nightly { "yes" } else { "" }).to_owned())),
    ];

    let (column_names, accessors): (Vec<_>, Vec<_>) = columns.into_iter().unzip();

    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            column_names
                .into_iter()
                .map(|name| Cell::new(name).add_attribute(Attribute::Bold)),
        );

    for instance in &instances {
        table.add_row(accessors.iter().map(|f| f(instance)));
    }

    println!("{table}");
    println!(
        "{} images, {} tags",
        instances.len(),
        instances.iter().map(|instance| instance.tags.len()).sum::<usize>()
    );

    Ok(())
}
