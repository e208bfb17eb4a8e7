// ==========================================
// 火车模型收藏管理 - 工作簿读取
// ==========================================
// 职责: Excel 文件 -> Sheet 列表（表头/数据行/合并区间）
// 约束: 行号保留工作表原始 1-based 行号，空白行过滤但不重排
// ==========================================

use calamine::{open_workbook, Data, Range, Reader, Xls, Xlsx};
use std::collections::HashMap;
use std::path::Path;

use crate::domain::{MergeRect, RawRow, Sheet};
use crate::importer::error::{ImportError, ImportModuleResult};

/// 工作簿读取器
pub struct WorkbookReader;

impl WorkbookReader {
    /// 读取 Excel 文件的全部工作表
    ///
    /// # 参数
    /// * `path` - 文件路径，仅接受 .xlsx / .xls
    ///
    /// # 返回
    /// * 工作表列表（保持文件内顺序）
    ///
    /// .xls 格式不携带合并单元格信息，merge_ranges 为空。
    pub fn read(path: impl AsRef<Path>) -> ImportModuleResult<Vec<Sheet>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" => Self::read_xlsx(path),
            "xls" => Self::read_xls(path),
            _ => Err(ImportError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn read_xlsx(path: &Path) -> ImportModuleResult<Vec<Sheet>> {
        let mut workbook: Xlsx<_> = open_workbook(path)?;
        workbook.load_merged_regions()?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

            // Dimensions 为 0-based 闭区间，统一转 1-based
            let merge_ranges = workbook
                .merged_regions_by_sheet(&name)
                .iter()
                .map(|(_, _, dims)| MergeRect {
                    min_row: dims.start.0 + 1,
                    max_row: dims.end.0 + 1,
                    min_col: dims.start.1 + 1,
                    max_col: dims.end.1 + 1,
                })
                .collect();

            sheets.push(build_sheet(name, &range, merge_ranges));
        }

        tracing::info!(file = %path.display(), sheet_count = sheets.len(), "工作簿读取完成");
        Ok(sheets)
    }

    fn read_xls(path: &Path) -> ImportModuleResult<Vec<Sheet>> {
        let mut workbook: Xls<_> = open_workbook(path)
            .map_err(|e: calamine::XlsError| ImportError::ExcelParseError(e.to_string()))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;
            sheets.push(build_sheet(name, &range, Vec::new()));
        }

        tracing::info!(file = %path.display(), sheet_count = sheets.len(), "工作簿读取完成");
        Ok(sheets)
    }
}

/// 将 calamine 的 Range 转为 Sheet
///
/// 首个非空区间行作为表头行，其后为数据行。
/// 表头为空白的列整列丢弃；整行空白的数据行过滤，行号不重排。
fn build_sheet(name: String, range: &Range<Data>, merge_ranges: Vec<MergeRect>) -> Sheet {
    let Some((start_row, _start_col)) = range.start() else {
        return Sheet { name, headers: Vec::new(), rows: Vec::new(), merge_ranges };
    };

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .map(|r| r.iter().map(cell_to_string).collect())
        .unwrap_or_default();

    let mut rows = Vec::new();
    for (idx, cells) in rows_iter.enumerate() {
        // 表头行占掉区间首行，数据行从其后一行起算
        let row_number = start_row + idx as u32 + 2;

        let mut map = HashMap::new();
        let mut all_blank = true;
        for (col, cell) in cells.iter().enumerate() {
            let Some(header) = headers.get(col).filter(|h| !h.is_empty()) else {
                continue;
            };
            let value = cell_to_string(cell);
            if !value.is_empty() {
                all_blank = false;
            }
            map.insert(header.clone(), value);
        }

        if !all_blank {
            rows.push(RawRow { row: row_number, cells: map });
        }
    }

    Sheet { name, headers, rows, merge_ranges }
}

/// 单元格取值统一转字符串
///
/// 整数值的浮点单元格去掉小数部分，日期单元格统一为 YYYY-MM-DD。
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => if *b { "是" } else { "否" }.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
