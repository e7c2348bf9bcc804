//! # Dataset Module / 数据集模块
//!
//! A dataset is a named numeric table: rows are samples, columns are channels,
//! and an optional (possibly partial) list of labels names the leading columns.
//! Simulations write their datasets as JSON documents:
//!
//! ```json
//! { "datasets": { "group/name": { "labels": ["time", "x"],
//!                                   "rows": [[0.0, 1.0], [0.1, "NaN"]] } } }
//! ```
//!
//! Samples are JSON numbers or one of the strings `NaN`, `inf` and `-inf`.
//! A dataset without rows may state its width with `columns`.
//!
//! 数据集是一个具名的数值表：行是采样，列是通道，一个可选的（可能不完整的）
//! 标签列表为前面的列命名。仿真以 JSON 文档写入数据集。
//! 采样值是 JSON 数字或字符串 `NaN`、`inf`、`-inf` 之一。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or building datasets.
/// 加载或构建数据集时出现的错误。
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("dataset '{name}': row {row} has {found} values, expected {expected}")]
    RaggedRow {
        name: String,
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("dataset '{name}': '{value}' is not a number")]
    InvalidSample { name: String, value: String },
    #[error("dataset '{name}': {labels} labels for {columns} columns")]
    TooManyLabels {
        name: String,
        labels: usize,
        columns: usize,
    },
    #[error("dataset '{name}': {rows} rows without values")]
    EmptyRows { name: String, rows: usize },
    #[error("CSV line {line}: {message}")]
    Csv { line: usize, message: String },
}

/// A numeric table with optional column labels. Immutable once built.
/// 带有可选列标签的数值表。构建后不可变。
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: usize,
    /// Row-major samples / 行优先存储的采样值
    data: Vec<f64>,
    labels: Vec<String>,
}

impl Dataset {
    /// Builds a dataset from rows. `columns` is only needed when there are no rows.
    /// 从行构建数据集。仅在没有行时才需要 `columns`。
    pub fn from_rows(
        name: &str,
        rows: Vec<Vec<f64>>,
        columns: Option<usize>,
        labels: Vec<String>,
    ) -> Result<Self, DatasetError> {
        let columns = rows
            .first()
            .map(Vec::len)
            .or(columns)
            .unwrap_or(labels.len());
        if columns == 0 && !rows.is_empty() {
            return Err(DatasetError::EmptyRows {
                name: name.to_string(),
                rows: rows.len(),
            });
        }
        let mut data = Vec::with_capacity(rows.len() * columns);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != columns {
                return Err(DatasetError::RaggedRow {
                    name: name.to_string(),
                    row,
                    found: values.len(),
                    expected: columns,
                });
            }
            data.extend(values);
        }
        if labels.len() > columns {
            return Err(DatasetError::TooManyLabels {
                name: name.to_string(),
                labels: labels.len(),
                columns,
            });
        }
        Ok(Self {
            columns,
            data,
            labels,
        })
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.data.len() / self.columns
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The label of column `index`, `None` if the label list does not reach it.
    /// 第 `index` 列的标签；如果标签列表未覆盖该列，则为 `None`。
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn value(&self, row: usize, column: usize) -> f64 {
        self.data[row * self.columns + column]
    }

    /// Iterates over the samples of one column.
    pub fn column(&self, index: usize) -> impl Iterator<Item = f64> + '_ {
        self.data
            .iter()
            .skip(index)
            .step_by(self.columns.max(1))
            .copied()
    }

    /// Parses the CSV written by FMU checkers: a header of (optionally quoted)
    /// labels, followed by comma separated numeric rows.
    ///
    /// 解析 FMU 检查器写入的 CSV：一行（可带引号的）标签头，随后是逗号分隔的数值行。
    pub fn from_csv(name: &str, text: &str) -> Result<Self, DatasetError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        let Some((_, header)) = lines.next() else {
            return Err(DatasetError::Csv {
                line: 1,
                message: "missing header".to_string(),
            });
        };
        let labels: Vec<String> = header
            .split(',')
            .map(|label| label.trim().trim_matches('"').to_string())
            .collect();

        let mut rows = Vec::new();
        for (index, line) in lines {
            let row = line
                .split(',')
                .map(|cell| {
                    cell.trim().parse::<f64>().map_err(|_| DatasetError::Csv {
                        line: index + 1,
                        message: format!("'{}' is not a number", cell.trim()),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            rows.push(row);
        }
        Self::from_rows(name, rows, Some(labels.len()), labels)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Sample {
    Number(f64),
    Text(String),
}

impl Sample {
    fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Sample::Number(value)
        } else if value.is_nan() {
            Sample::Text("NaN".to_string())
        } else if value > 0.0 {
            Sample::Text("inf".to_string())
        } else {
            Sample::Text("-inf".to_string())
        }
    }

    fn to_f64(&self, name: &str) -> Result<f64, DatasetError> {
        match self {
            Sample::Number(v) => Ok(*v),
            Sample::Text(text) => text.trim().parse().map_err(|_| DatasetError::InvalidSample {
                name: name.to_string(),
                value: text.clone(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawDataset {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    columns: Option<usize>,
    #[serde(default)]
    rows: Vec<Vec<Sample>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawFile {
    #[serde(default)]
    datasets: BTreeMap<String, RawDataset>,
}

/// All datasets of one file, keyed by name.
/// 一个文件中的所有数据集，按名称索引。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetCollection {
    datasets: BTreeMap<String, Dataset>,
}

impl DatasetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, dataset: Dataset) {
        self.datasets.insert(name.into(), dataset);
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Dataset names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dataset)> {
        self.datasets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parses a JSON dataset document; `origin` is only used in error messages.
    /// 解析 JSON 数据集文档；`origin` 仅用于错误消息。
    pub fn parse(text: &str, origin: &Path) -> Result<Self, DatasetError> {
        let raw: RawFile = serde_json::from_str(text).map_err(|source| DatasetError::Json {
            path: origin.to_path_buf(),
            source,
        })?;
        let mut collection = Self::new();
        for (name, raw) in raw.datasets {
            let rows = raw
                .rows
                .iter()
                .map(|row| row.iter().map(|s| s.to_f64(&name)).collect())
                .collect::<Result<Vec<Vec<f64>>, _>>()?;
            let dataset = Dataset::from_rows(&name, rows, raw.columns, raw.labels)?;
            collection.insert(name, dataset);
        }
        Ok(collection)
    }

    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let text = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let raw = RawFile {
            datasets: self
                .datasets
                .iter()
                .map(|(name, ds)| {
                    let rows = (0..ds.rows())
                        .map(|r| {
                            (0..ds.columns())
                                .map(|c| Sample::from_f64(ds.value(r, c)))
                                .collect()
                        })
                        .collect();
                    let raw = RawDataset {
                        labels: ds.labels.clone(),
                        columns: (ds.rows() == 0).then_some(ds.columns()),
                        rows,
                    };
                    (name.clone(), raw)
                })
                .collect(),
        };
        serde_json::to_string_pretty(&raw)
    }

    /// Writes the collection to `path` atomically.
    /// 以原子方式将集合写入 `path`。
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        crate::infra::fs::write_atomic(path, json.as_bytes())
    }
}

/// All dataset files of one directory, keyed by file name.
/// 一个目录中的所有数据集文件，按文件名索引。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetStore {
    files: BTreeMap<String, DatasetCollection>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: impl Into<String>, collection: DatasetCollection) {
        self.files.insert(file.into(), collection);
    }

    pub fn get(&self, file: &str) -> Option<&DatasetCollection> {
        self.files.get(file)
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Loads every file in `dir` whose name ends with `suffix`.
    /// 加载 `dir` 中名称以 `suffix` 结尾的每个文件。
    pub fn load_dir(dir: &Path, suffix: &str) -> Result<Self, DatasetError> {
        let io_error = |source| DatasetError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut store = Self::new();
        if !dir.is_dir() {
            return Ok(store);
        }
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(suffix) && path.is_file() {
                let name = name.to_string();
                store.insert(name, DatasetCollection::load(&path)?);
            }
        }
        Ok(store)
    }
}
