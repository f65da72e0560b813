use crate::cache::SharedStore;

/// Drop every cached entry. The store is written out when the process exits.
pub fn cmd_cache_clear(store: &SharedStore, stdout: &mut impl std::io::Write) -> anyhow::Result<()> {
    store.borrow_mut().clear();
    writeln!(stdout, "Cache cleared")?;
    Ok(())
}
