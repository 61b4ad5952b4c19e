//! Base installer: materialise a full snapshot into an empty mirror.

use lexmirror_core::{Delivery, Target, format_timestamp};
use tracing::info;

use crate::StoreError;
use crate::cache::ArchiveCache;
use crate::extract::Extractor;
use crate::mirror::Mirror;
use crate::staging::{Staging, overlay};

/// Install `base` into `mirror`, which must be empty or freshly wiped.
///
/// The whole sequence (extract, overlay, metadata) runs under the flag; on
/// failure the flag stays and the next run reports an incoherent mirror.
pub fn install_base(
    mirror: &Mirror,
    cache: &ArchiveCache,
    extractor: &dyn Extractor,
    base: &Delivery,
) -> Result<u64, StoreError> {
    let corpus = mirror.corpus();
    mirror.ensure_coherent()?;
    if !base.is_base() {
        return Err(StoreError::Precondition {
            corpus,
            action: "install base",
            reason: format!("{base} is not a base dump"),
        });
    }
    let installed = mirror.current()?;
    if let Some(current) = installed {
        return Err(StoreError::Precondition {
            corpus,
            action: "install base",
            reason: format!(
                "mirror already at {}; wipe it first",
                format_timestamp(&current)
            ),
        });
    }
    let archive = cache.path_of(base);
    if !archive.is_file() {
        return Err(StoreError::MissingDelivery {
            corpus,
            target: Target::Until(base.timestamp),
            oldest_known: None,
            installed,
        });
    }

    let guard = mirror.lock(format!(
        "installing base dump {}",
        format_timestamp(&base.timestamp)
    ))?;
    let parent = mirror.root().parent().unwrap_or(mirror.root());
    let staging = Staging::extract(extractor, &archive, parent, corpus, *base)?;
    let files = match staging.tree_root()? {
        Some(tree) => overlay(&tree, mirror.root())?,
        None => 0,
    };
    staging.discard()?;
    mirror.record_applied(&base.timestamp)?;
    guard.release()?;

    info!(corpus = %corpus, delivery = %base, files, "base dump installed");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::TarGzExtractor;
    use crate::flag::FLAG_FILE;
    use crate::test_support::{Fixture, ts};

    #[test]
    fn installs_into_empty_mirror() {
        let fx = Fixture::new();
        let base = fx.base("20140101-000000", &[("global/a.xml", "a0"), ("global/b.xml", "b0")]);

        let files = install_base(&fx.mirror(), &fx.cache(), &TarGzExtractor, &base).unwrap();

        assert_eq!(files, 2);
        assert_eq!(fx.read("global/a.xml").as_deref(), Some("a0"));
        let state = fx.mirror().state().unwrap();
        assert_eq!(state.current, Some(ts("20140101-000000")));
        assert_eq!(state.history, vec![ts("20140101-000000")]);
        assert_eq!(state.flag, None);
        // Staging is gone.
        let leftovers: Vec<_> = std::fs::read_dir(fx.mirrors_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".staging"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn missing_archive_is_missing_delivery() {
        let fx = Fixture::new();
        let base = Delivery::base(ts("20140101-000000"));
        let err = install_base(&fx.mirror(), &fx.cache(), &TarGzExtractor, &base).unwrap_err();
        assert!(matches!(err, StoreError::MissingDelivery { .. }));
        assert!(!fx.mirror().root().join(FLAG_FILE).exists());
    }

    #[test]
    fn refuses_installed_mirror() {
        let fx = Fixture::new();
        let base = fx.base("20140101-000000", &[("global/a.xml", "a0")]);
        install_base(&fx.mirror(), &fx.cache(), &TarGzExtractor, &base).unwrap();
        let err = install_base(&fx.mirror(), &fx.cache(), &TarGzExtractor, &base).unwrap_err();
        assert!(matches!(err, StoreError::Precondition { .. }));
    }

    #[test]
    fn corrupt_archive_leaves_flag_and_metadata_untouched() {
        let fx = Fixture::new();
        let base = Delivery::base(ts("20140101-000000"));
        std::fs::write(fx.cache().path_of(&base), b"not an archive").unwrap();

        let err = install_base(&fx.mirror(), &fx.cache(), &TarGzExtractor, &base).unwrap_err();

        assert!(matches!(err, StoreError::ArchiveUnreadable { .. }));
        let state = fx.mirror().state().unwrap();
        assert_eq!(state.current, None);
        assert!(state.flag.is_some());
    }
}
