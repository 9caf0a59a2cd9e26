//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use vendor_deploy::testing::{CannedLicenseSource, ScriptedHttp, ScriptedRunner};
use vendor_deploy::{
    CommandOutput, DeployOptions, DeployPaths, DeployProgress, Deployer, LicenseSupply,
    ProductProfile,
};

pub const CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIBkTCB+wIJA\n-----END CERTIFICATE-----\n";

pub const LISTENING: &str = "\
LISTEN 0      128          0.0.0.0:22         0.0.0.0:*    users:((\"sshd\",pid=901,fd=3))
LISTEN 0      100             [::]:8443          [::]:*    users:((\"vendor-server\",pid=4121,fd=9))
";

/// A fake host rooted in a temporary directory.
pub struct Sandbox {
    pub root: tempfile::TempDir,
    pub workdir: PathBuf,
    pub paths: DeployPaths,
}

impl Sandbox {
    /// A certified Rocky 9.3 host with an empty working directory.
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let paths = DeployPaths::default().rooted_at(root.path());
        let workdir = root.path().join("media");
        std::fs::create_dir_all(&workdir).unwrap();
        std::fs::create_dir_all(paths.os_release.parent().unwrap()).unwrap();
        std::fs::write(&paths.os_release, "NAME=\"Rocky Linux\"\nID=\"rocky\"\nVERSION_ID=\"9.3\"\n")
            .unwrap();
        Self { root, workdir, paths }
    }

    pub fn with_os_release(self, text: &str) -> Self {
        std::fs::write(&self.paths.os_release, text).unwrap();
        self
    }

    /// Drop a vendor archive with `install.sh` nested one level down.
    pub fn with_archive(self) -> Self {
        let file = std::fs::File::create(self.workdir.join("vendor-server-5.2.tar.gz")).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        append(&mut builder, "vendor-server-5.2/install.sh", b"#!/bin/sh\nexit 0\n");
        append(&mut builder, "vendor-server-5.2/lib/payload.bin", b"payload");
        builder.into_inner().unwrap().finish().unwrap();
        self
    }

    /// Pre-install a well-formed certificate.
    pub fn with_certificate(self) -> Self {
        std::fs::create_dir_all(self.paths.certificate.parent().unwrap()).unwrap();
        std::fs::write(&self.paths.certificate, CERT).unwrap();
        self
    }

    pub fn options(&self) -> DeployOptions {
        DeployOptions {
            workdir: self.workdir.clone(),
            paths: self.paths.clone(),
            ..DeployOptions::default()
        }
    }

    pub fn deployer(
        &self,
        runner: Arc<ScriptedRunner>,
        http: Arc<ScriptedHttp>,
        license: Arc<CannedLicenseSource>,
    ) -> Deployer {
        Deployer::new(self.options(), ProductProfile::default(), runner, http, license).with_euid(0)
    }

    pub fn read(&self, path: &std::path::Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }
}

fn append<W: std::io::Write>(builder: &mut tar::Builder<W>, path: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, data).unwrap();
}

/// A host where the service comes up immediately.
pub fn healthy_runner() -> ScriptedRunner {
    ScriptedRunner::new()
        .respond("ss -ltnpH", CommandOutput::ok(LISTENING))
        .respond("hostname -I", CommandOutput::ok("127.0.0.1 192.168.122.1 10.0.0.5\n"))
}

/// A console answering 200 and, with a certificate present, a valid license.
pub fn healthy_http() -> ScriptedHttp {
    ScriptedHttp::new()
        .respond("/api/license/status", 200, "{\"status\": \"VALID\"}")
        .respond("http://10.0.0.5:8443/console/", 200, "<html></html>")
}

pub fn no_license() -> Arc<CannedLicenseSource> {
    Arc::new(CannedLicenseSource::new(Vec::new()))
}

pub fn pasted_license() -> Arc<CannedLicenseSource> {
    Arc::new(CannedLicenseSource::new([LicenseSupply::Content(CERT.to_string())]))
}

/// Collects progress events.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<DeployProgress>>>);

impl Recorder {
    pub fn callback(&self) -> impl Fn(DeployProgress) + Send + Sync {
        let events = self.0.clone();
        move |progress| events.lock().unwrap().push(progress)
    }

    pub fn events(&self) -> Vec<DeployProgress> {
        self.0.lock().unwrap().clone()
    }
}
