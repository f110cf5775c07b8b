//! Source resolver
//!
//! Turns each repository's classified source selector into the build
//! arguments and volume mounts that get that source into a container. Service
//! builders take their mounts from here and never format mount strings
//! themselves, so the builder and emulator sides of a named volume always
//! agree.

use crate::catalog::{
    self, Repository, Subsystem, ENTRYPOINT_DEST, MONOREPO_WHEELS_DEST, MONOREPO_WHEELS_VOLUME,
    STATE_MANAGER_DIST_DEST, STATE_MANAGER_DIST_VOLUME, STATE_MANAGER_VENV_DEST,
    STATE_MANAGER_VENV_VOLUME,
};
use crate::compose::config::VolumeMount;
use crate::input::model::Sources;
use crate::input::source::SourceSelector;
use crate::settings::Settings;
use std::collections::BTreeMap;

/// Resolves mount and build-arg fragments for every repository
#[derive(Debug, Clone, Copy)]
pub struct SourceResolver<'a> {
    sources: &'a Sources,
    settings: &'a Settings,
    docker_dir: &'a str,
}

impl<'a> SourceResolver<'a> {
    pub fn new(sources: &'a Sources, settings: &'a Settings, docker_dir: &'a str) -> Self {
        Self {
            sources,
            settings,
            docker_dir: docker_dir.trim_end_matches('/'),
        }
    }

    pub fn selector(&self, repo: Repository) -> &'a SourceSelector {
        self.sources.get(repo)
    }

    /// Build arguments baking the download location into a builder image.
    /// Empty for local sources.
    pub fn build_args(&self, repo: Repository) -> BTreeMap<String, String> {
        let url = match self.selector(repo) {
            SourceSelector::Latest => self.settings.repo_head(repo).to_string(),
            SourceSelector::Revision(revision) => self.settings.repo_commit(repo, revision),
            SourceSelector::Local(_) => return BTreeMap::new(),
        };
        tracing::debug!("Resolved {} source to {}", repo, url);
        BTreeMap::from([(repo.build_arg_name().to_string(), url)])
    }

    /// Shared entrypoint script
    pub fn entrypoint_mount(&self) -> VolumeMount {
        VolumeMount::bind(
            format!("{}/entrypoint.sh", self.docker_dir),
            ENTRYPOINT_DEST,
        )
    }

    /// Host checkout mounted at `/{canonical name}`, when the source is local
    pub fn local_source_mount(&self, repo: Repository) -> Option<VolumeMount> {
        self.selector(repo).local_path().map(|path| {
            VolumeMount::bind(
                path.display().to_string(),
                format!("/{}", repo.canonical_name()),
            )
        })
    }

    /// Mounts of the builder service compiling `repo`
    pub fn builder_volumes(&self, repo: Repository) -> Vec<VolumeMount> {
        let mut mounts = vec![self.entrypoint_mount()];
        mounts.extend(self.local_source_mount(repo));

        mounts.extend(
            repo.cache_volumes()
                .iter()
                .map(|(name, dest)| VolumeMount::named(*name, *dest)),
        );

        match repo {
            Repository::Monorepo => {
                mounts.push(VolumeMount::named(MONOREPO_WHEELS_VOLUME, MONOREPO_WHEELS_DEST));
            }
            Repository::Ot3Firmware => {
                mounts.push(VolumeMount::named(
                    STATE_MANAGER_DIST_VOLUME,
                    format!("/volumes/{}", STATE_MANAGER_DIST_VOLUME),
                ));
                mounts.push(VolumeMount::named(
                    STATE_MANAGER_VENV_VOLUME,
                    format!("/volumes/{}", STATE_MANAGER_VENV_VOLUME),
                ));
            }
            Repository::OpentronsModules => {}
        }

        for subsystem in repo.subsystems() {
            mounts.push(VolumeMount::named(
                catalog::builder_volume_name(*subsystem),
                catalog::builder_volume_dest(*subsystem),
            ));
        }
        for subsystem in repo.subsystems().iter().filter(|s| s.has_eeprom()) {
            mounts.push(VolumeMount::named(
                catalog::eeprom_volume_name(*subsystem),
                catalog::eeprom_builder_dest(*subsystem),
            ));
        }

        mounts
    }

    /// Mounts of a runtime service consuming the monorepo
    pub fn monorepo_emulator_volumes(&self) -> Vec<VolumeMount> {
        vec![
            self.entrypoint_mount(),
            VolumeMount::named(MONOREPO_WHEELS_VOLUME, MONOREPO_WHEELS_DEST),
        ]
    }

    /// Mounts of a runtime service running a compiled subsystem executable
    pub fn subsystem_emulator_volumes(&self, subsystem: Subsystem) -> Vec<VolumeMount> {
        let mut mounts = vec![
            self.entrypoint_mount(),
            VolumeMount::named(
                catalog::builder_volume_name(subsystem),
                catalog::emulator_volume_dest(subsystem),
            ),
        ];
        if subsystem.has_eeprom() {
            mounts.push(VolumeMount::named(
                catalog::eeprom_volume_name(subsystem),
                catalog::eeprom_emulator_dest(subsystem),
            ));
        }
        mounts
    }

    /// State manager venv and wheel volumes as seen by the state manager
    pub fn state_manager_volumes(&self) -> Vec<VolumeMount> {
        vec![
            VolumeMount::named(STATE_MANAGER_VENV_VOLUME, STATE_MANAGER_VENV_DEST),
            VolumeMount::named(STATE_MANAGER_DIST_VOLUME, STATE_MANAGER_DIST_DEST),
        ]
    }
}
