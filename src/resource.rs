use std::fmt;
use std::str::FromStr;

/// The collections the backend exposes with the same list/get/create/
/// update/delete shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Courses,
    Assignments,
    Exams,
    Webinars,
    Students,
    Library,
    Forum,
}

pub const RESOURCES: [Resource; 7] = [
    Resource::Courses,
    Resource::Assignments,
    Resource::Exams,
    Resource::Webinars,
    Resource::Students,
    Resource::Library,
    Resource::Forum,
];

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            Resource::Courses => "courses",
            Resource::Assignments => "assignments",
            Resource::Exams => "exams",
            Resource::Webinars => "webinars",
            Resource::Students => "students",
            Resource::Library => "library",
            Resource::Forum => "forum",
        };
        write!(f, "{str}")
    }
}

#[derive(Debug)]
pub struct ResourceParseErr;

impl fmt::Display for ResourceParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = RESOURCES.iter().map(|r| r.to_string()).collect();
        write!(f, "Resource must be one of: {}", names.join(", "))
    }
}

impl std::error::Error for ResourceParseErr {}

impl FromStr for Resource {
    type Err = ResourceParseErr;
    fn from_str(resource: &str) -> Result<Self, Self::Err> {
        match resource {
            "courses" => Ok(Resource::Courses),
            "assignments" => Ok(Resource::Assignments),
            "exams" => Ok(Resource::Exams),
            "webinars" => Ok(Resource::Webinars),
            "students" => Ok(Resource::Students),
            "library" => Ok(Resource::Library),
            "forum" => Ok(Resource::Forum),
            _ => Err(ResourceParseErr),
        }
    }
}

/// Offset paging as the backend takes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
        }
    }
}

impl Page {
    pub fn new(skip: u32, limit: u32) -> Self {
        Self { skip, limit }
    }
}

impl Resource {
    /// `/courses` and so on
    pub fn path(&self) -> String {
        format!("/{self}")
    }

    pub fn item_path(&self, id: &str) -> String {
        format!("/{self}/{}", urlencoding::encode(id))
    }

    /// The list query.  An absent or empty `category` adds no term.
    pub fn list_path(&self, page: Page, category: Option<&str>) -> String {
        let mut path = format!("/{self}?skip={}&limit={}", page.skip, page.limit);
        if let Some(category) = category.filter(|c| !c.is_empty()) {
            path.push_str("&category=");
            path.push_str(&urlencoding::encode(category));
        }
        path
    }
}
