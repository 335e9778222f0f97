use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// 笔记分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Books,
    Notes,
    #[serde(rename = "Previous Year")]
    PreviousYear,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Books,
        Category::Notes,
        Category::PreviousYear,
        Category::Other,
    ];

    /// 页面与接口上使用的名称
    pub fn label(self) -> &'static str {
        match self {
            Category::Books => "Books",
            Category::Notes => "Notes",
            Category::PreviousYear => "Previous Year",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    /// 忽略大小写，同时接受命令行里常用的简写
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "books" | "book" => Ok(Category::Books),
            "notes" | "note" => Ok(Category::Notes),
            "previous year" | "previous-year" | "previous_year" | "pyq" => {
                Ok(Category::PreviousYear)
            }
            "other" => Ok(Category::Other),
            _ => Err(format!("unknown category: {}", s)),
        }
    }
}

/// 学年（1..4），接口上以字符串 "1".."4" 表示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StudyYear {
    First,
    Second,
    Third,
    Fourth,
}

impl StudyYear {
    pub const ALL: [StudyYear; 4] = [
        StudyYear::First,
        StudyYear::Second,
        StudyYear::Third,
        StudyYear::Fourth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StudyYear::First => "1",
            StudyYear::Second => "2",
            StudyYear::Third => "3",
            StudyYear::Fourth => "4",
        }
    }

    /// 分页标签
    pub fn label(self) -> &'static str {
        match self {
            StudyYear::First => "1st Year",
            StudyYear::Second => "2nd Year",
            StudyYear::Third => "3rd Year",
            StudyYear::Fourth => "4th Year",
        }
    }
}

impl fmt::Display for StudyYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyYear {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(StudyYear::First),
            "2" => Ok(StudyYear::Second),
            "3" => Ok(StudyYear::Third),
            "4" => Ok(StudyYear::Fourth),
            other => Err(format!("year must be between 1 and 4, got '{}'", other)),
        }
    }
}

impl Serialize for StudyYear {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

// 旧数据里的 year 可能是数字也可能是字符串
impl<'de> Deserialize<'de> for StudyYear {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Visitor;

        struct YearVisitor;

        impl<'de> Visitor<'de> for YearVisitor {
            type Value = StudyYear;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer between 1 and 4")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(E::custom)
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&value.to_string())
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&value.to_string())
            }
        }

        deserializer.deserialize_any(YearVisitor)
    }
}

/// 创建笔记的请求体（不含 id）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub subject_code: String,
    pub subject_name: String,
    pub year: StudyYear,
    pub category: Category,
    /// 已上传文件的地址
    pub file: String,
}

/// 后端保存的笔记
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(rename = "_id")]
    pub id: String,
    pub subject_code: String,
    pub subject_name: String,
    pub year: StudyYear,
    pub category: Category,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn from_new(id: impl Into<String>, new: NewNote) -> Self {
        Self {
            id: id.into(),
            subject_code: new.subject_code,
            subject_name: new.subject_name,
            year: new.year,
            category: new.category,
            file: new.file,
            created_at: Some(Utc::now()),
        }
    }

    /// 下载时建议的文件名
    pub fn download_name(&self) -> String {
        format!("{}.pdf", self.subject_code)
    }
}

/// 笔记表单字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    SubjectCode,
    SubjectName,
    Year,
    Category,
    File,
}

impl NoteField {
    pub const ALL: [NoteField; 5] = [
        NoteField::SubjectCode,
        NoteField::SubjectName,
        NoteField::Year,
        NoteField::Category,
        NoteField::File,
    ];

    /// 对应的接口字段名
    pub fn name(self) -> &'static str {
        match self {
            NoteField::SubjectCode => "subjectCode",
            NoteField::SubjectName => "subjectName",
            NoteField::Year => "year",
            NoteField::Category => "category",
            NoteField::File => "file",
        }
    }
}

/// 表单的原始输入，全部按字符串保存
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteForm {
    pub subject_code: String,
    pub subject_name: String,
    pub year: String,
    pub category: String,
    pub file: String,
}

impl NoteForm {
    pub fn get(&self, field: NoteField) -> &str {
        match field {
            NoteField::SubjectCode => &self.subject_code,
            NoteField::SubjectName => &self.subject_name,
            NoteField::Year => &self.year,
            NoteField::Category => &self.category,
            NoteField::File => &self.file,
        }
    }

    pub fn set(&mut self, field: NoteField, value: impl Into<String>) {
        let value = value.into();
        match field {
            NoteField::SubjectCode => self.subject_code = value,
            NoteField::SubjectName => self.subject_name = value,
            NoteField::Year => self.year = value,
            NoteField::Category => self.category = value,
            NoteField::File => self.file = value,
        }
    }

    pub fn is_blank(&self) -> bool {
        NoteField::ALL.iter().all(|f| self.get(*f).is_empty())
    }

    /// 检查除 file 以外的字段
    pub fn validate_fields(&self) -> ValidationError {
        let mut errors = ValidationError::new();
        for field in NoteField::ALL {
            if field != NoteField::File {
                errors.require(field.name(), self.get(field));
            }
        }
        errors
    }

    /// 检查全部必填项
    pub fn validate(&self) -> ValidationError {
        let mut errors = self.validate_fields();
        errors.require(NoteField::File.name(), &self.file);
        errors
    }

    /// 解析年份与分类，格式错误记入 errors
    pub fn parse_choices(&self, errors: &mut ValidationError) -> Option<(StudyYear, Category)> {
        let year = parse_field(&self.year, NoteField::Year, errors);
        let category = parse_field(&self.category, NoteField::Category, errors);
        year.zip(category)
    }

    /// 校验并转换为请求体
    pub fn to_new_note(&self) -> Result<NewNote, ValidationError> {
        let mut errors = self.validate();
        let choices = self.parse_choices(&mut errors);

        if let (true, Some((year, category))) = (errors.is_empty(), choices) {
            return Ok(NewNote {
                subject_code: self.subject_code.trim().to_string(),
                subject_name: self.subject_name.trim().to_string(),
                year,
                category,
                file: self.file.clone(),
            });
        }
        Err(errors)
    }
}

/// 解析枚举字段；空值已由必填校验处理，这里只记录格式错误
fn parse_field<T>(value: &str, field: NoteField, errors: &mut ValidationError) -> Option<T>
where
    T: FromStr<Err = String>,
{
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(msg) => {
            if !value.trim().is_empty() {
                errors.add(field.name(), msg);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::REQUIRED_MESSAGE;

    fn filled_form() -> NoteForm {
        NoteForm {
            subject_code: "CS101".to_string(),
            subject_name: "Programming".to_string(),
            year: "2".to_string(),
            category: "Previous Year".to_string(),
            file: "https://cdn.example/raw/upload/cs101.pdf".to_string(),
        }
    }

    #[test]
    fn test_note_wire_format() {
        let note = Note::from_new("abc", filled_form().to_new_note().unwrap());
        let json = serde_json::to_value(&note).unwrap();

        assert_eq!(json["_id"], "abc");
        assert_eq!(json["subjectCode"], "CS101");
        assert_eq!(json["year"], "2");
        assert_eq!(json["category"], "Previous Year");
    }

    #[test]
    fn test_year_accepts_number_or_string() {
        let a: StudyYear = serde_json::from_str("3").unwrap();
        let b: StudyYear = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(a, StudyYear::Third);
        assert_eq!(a, b);
        assert!(serde_json::from_str::<StudyYear>("5").is_err());
    }

    #[test]
    fn test_empty_form_flags_every_field() {
        let errors = NoteForm::default().validate();
        for field in NoteField::ALL {
            assert_eq!(errors.message(field.name()), Some(REQUIRED_MESSAGE));
        }
    }

    #[test]
    fn test_bad_year_is_reported_on_year_field() {
        let mut form = filled_form();
        form.year = "7".to_string();
        let errors = form.to_new_note().unwrap_err();
        assert!(errors.contains("year"));
        assert_eq!(errors.fields.len(), 1);
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!("pyq".parse::<Category>().unwrap(), Category::PreviousYear);
        assert_eq!("BOOKS".parse::<Category>().unwrap(), Category::Books);
        assert!("papers".parse::<Category>().is_err());
    }
}
