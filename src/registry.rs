use crate::error::LyraError;

/// Zenodo record holding the curated DMR studies.
const MRR_REPOSITORY: &str = "15285017";
/// Zenodo record holding the TRISTAN human and rat studies.
const TRISTAN_REPOSITORY: &str = "15301607";
/// Zenodo record holding the grouped rat imaging projects.
const RAT_REPOSITORY: &str = "10675642";

#[derive(Debug, Clone)]
pub struct DatasetEntry {
    pub name: String,
    pub repository_id: String,
}

#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub name: String,
    pub files: Vec<String>,
}

/// Read-only mapping from dataset names to repository ids and from group
/// names to ordered file lists. Constructed once at startup and passed into
/// [`crate::app::App`]; tests substitute their own instance.
#[derive(Debug, Clone)]
pub struct Registry {
    datasets: Vec<DatasetEntry>,
    groups: Vec<GroupEntry>,
    group_repository: String,
    default_group: String,
}

impl Registry {
    pub fn new(
        datasets: Vec<DatasetEntry>,
        groups: Vec<GroupEntry>,
        group_repository: impl Into<String>,
        default_group: impl Into<String>,
    ) -> Self {
        Self {
            datasets,
            groups,
            group_repository: group_repository.into(),
            default_group: default_group.into(),
        }
    }

    /// The production registry of this domain.
    pub fn standard() -> Self {
        let datasets = [
            ("KRUK.dmr.zip", MRR_REPOSITORY),
            ("tristan_humans_healthy_controls.dmr.zip", TRISTAN_REPOSITORY),
            (
                "tristan_humans_healthy_ciclosporin.dmr.zip",
                TRISTAN_REPOSITORY,
            ),
            (
                "tristan_humans_healthy_metformin.dmr.zip",
                TRISTAN_REPOSITORY,
            ),
            (
                "tristan_humans_healthy_rifampicin.dmr.zip",
                TRISTAN_REPOSITORY,
            ),
            (
                "tristan_humans_patients_rifampicin.dmr.zip",
                TRISTAN_REPOSITORY,
            ),
            (
                "tristan_rats_healthy_multiple_dosing.dmr.zip",
                TRISTAN_REPOSITORY,
            ),
            (
                "tristan_rats_healthy_reproducibility.dmr.zip",
                TRISTAN_REPOSITORY,
            ),
            ("tristan_rats_healthy_six_drugs.dmr.zip", TRISTAN_REPOSITORY),
        ]
        .into_iter()
        .map(|(name, repository_id)| DatasetEntry {
            name: name.to_string(),
            repository_id: repository_id.to_string(),
        })
        .collect();

        let groups = [
            (
                "bosentan_highdose",
                &[
                    "bosentan_highdose_sanofi.zip",
                    "bosentan_highdose_bayer.zip",
                    "bosentan_highdose_astrazeneca.zip",
                ][..],
            ),
            (
                "bosentan_lowdose",
                &["bosentan_lowdose_sanofi.zip", "bosentan_lowdose_bayer.zip"][..],
            ),
            ("relaxivity", &["relaxivity_leeds.zip"][..]),
            (
                "multiple_dosing",
                &["multiple_dosing_sanofi.zip", "multiple_dosing_gsk.zip"][..],
            ),
            (
                "reproducibility",
                &[
                    "reproducibility_leeds.zip",
                    "reproducibility_sheffield.zip",
                ][..],
            ),
            (
                "six_test_compounds",
                &[
                    "six_test_compounds_asunaprevir.zip",
                    "six_test_compounds_bosentan.zip",
                    "six_test_compounds_cyclosporine.zip",
                    "six_test_compounds_ketoconazole.zip",
                    "six_test_compounds_pioglitazone.zip",
                    "six_test_compounds_rifampicin.zip",
                ][..],
            ),
        ]
        .into_iter()
        .map(|(name, files)| GroupEntry {
            name: name.to_string(),
            files: files.iter().map(|file| file.to_string()).collect(),
        })
        .collect();

        Self::new(datasets, groups, RAT_REPOSITORY, "bosentan_highdose")
    }

    pub fn repository_for(&self, dataset: &str) -> Result<&str, LyraError> {
        self.datasets
            .iter()
            .find(|entry| entry.name == dataset)
            .map(|entry| entry.repository_id.as_str())
            .ok_or_else(|| LyraError::UnknownDataset(dataset.to_string()))
    }

    /// Group lookup is case-sensitive; only the "all" sentinel handled by the
    /// fetcher is not.
    pub fn group(&self, name: &str) -> Option<&GroupEntry> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn groups(&self) -> &[GroupEntry] {
        &self.groups
    }

    pub fn available_groups(&self) -> String {
        self.groups
            .iter()
            .map(|group| group.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn default_group(&self) -> &str {
        &self.default_group
    }

    pub fn group_repository(&self) -> &str {
        &self.group_repository
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}
