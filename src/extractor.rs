use crate::decoder::{DecoderConfig, ResourceDecoder, ResourceFailure, ResourceKind};
use crate::source::{ApkSource, DirectorySource, ResourceSource};
use crate::store::{ContentStore, WriteReport};
use crate::{Error, Result};
use std::path::Path;
use tracing::info;

/// What one application scan produced
#[derive(Debug)]
pub struct ScanReport {
    pub package: String,
    pub animations: WriteReport,
    pub interpolators: WriteReport,
    pub failures: Vec<ResourceFailure>,
    pub out_of_scope: Vec<String>,
}

impl ScanReport {
    /// The first resource that failed to decode, if any
    pub fn first_error(&self) -> Option<&ResourceFailure> {
        self.failures.first()
    }

    pub fn written(&self) -> u64 {
        self.animations.written + self.interpolators.written
    }
}

/// Decodes applications and stores their animations and interpolators
pub struct Extractor {
    decoder: ResourceDecoder,
    store: ContentStore,
}

impl Extractor {
    pub fn new(config: DecoderConfig, store: ContentStore) -> Self {
        Self {
            decoder: ResourceDecoder::new(config),
            store,
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn into_store(self) -> ContentStore {
        self.store
    }

    /// Decode one application and write its animations, then its interpolators.
    ///
    /// Resources that fail to decode are listed in the report. Store failures abort the
    /// scan.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use maltap::{ContentStore, DecoderConfig, DedupPolicy, DirectorySource, Extractor};
    ///
    /// let store = ContentStore::open("animations.db", DedupPolicy::default()).unwrap();
    /// let mut extractor = Extractor::new(DecoderConfig::default(), store);
    /// let mut source = DirectorySource::open("out/com.example.app", None).unwrap();
    /// let report = extractor.scan(&mut source).unwrap();
    /// if let Some(failure) = report.first_error() {
    ///     eprintln!("{}: {}", failure.file_name, failure.error);
    /// }
    /// ```
    pub fn scan(&mut self, source: &mut dyn ResourceSource) -> Result<ScanReport> {
        let package = source.package_name().to_string();
        info!(package = %package, location = %source.location().display(), "scanning application");

        let resources = source.resources()?;
        let outcome = self.decoder.decode(&resources, &package);

        let animations = self.store.write_animations(&outcome.animations)?;
        let interpolators = self.store.write_interpolators(&outcome.interpolators)?;

        Ok(ScanReport {
            package,
            animations,
            interpolators,
            failures: outcome.failures,
            out_of_scope: outcome.out_of_scope,
        })
    }

    /// Scan an APK file or an extracted application directory
    pub fn scan_path(&mut self, path: impl AsRef<Path>, package: Option<String>) -> Result<ScanReport> {
        let path = path.as_ref();
        if path.is_dir() {
            self.scan(&mut DirectorySource::open(path, package)?)
        } else {
            self.scan(&mut ApkSource::open(path, package)?)
        }
    }

    /// Render one compiled animation or interpolator as canonical XML, without storing it
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use maltap::{DecoderConfig, Extractor};
    ///
    /// let bytes = std::fs::read("res/anim/fade_in.xml").unwrap();
    /// println!("{}", Extractor::dump(&bytes, DecoderConfig::default()).unwrap());
    /// ```
    pub fn dump(bytes: &[u8], config: DecoderConfig) -> Result<String> {
        let decoder = ResourceDecoder::new(config);
        match decoder.decode_resource(bytes, "", "")? {
            Some(decoded) => Ok(decoded.entry.content),
            None => Err(Error::Usage(
                "Document is not a tween animation or interpolator".to_string(),
            )),
        }
    }

    /// Same as [`Extractor::dump`], reading from a file
    pub fn dump_file(path: impl AsRef<Path>, config: DecoderConfig) -> Result<String> {
        let bytes = std::fs::read(path)?;
        Self::dump(&bytes, config)
    }

    /// Rows currently stored for `kind`
    pub fn stored(&self, kind: ResourceKind) -> Result<u64> {
        Ok(self.store.row_count(kind)?)
    }
}
