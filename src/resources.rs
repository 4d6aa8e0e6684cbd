//! Resource specific calls.  Every one of these is a fixed path over
//! the generic verbs in `api_client`; none of them look inside the
//! entities they move.
use crate::api_client::{ApiClient, UploadFile};
use crate::api_error::ApiError;
use crate::api_result::{ApiResult, ResponseBody};
use crate::resource::{Page, Resource};
use serde::Serialize;
use std::collections::BTreeMap;

type Reply = Result<ApiResult<ResponseBody>, ApiError>;

impl ApiClient {
    pub async fn list(&self, resource: Resource, page: Page, category: Option<&str>) -> Reply {
        self.get(resource.list_path(page, category).as_str()).await
    }

    pub async fn get_one(&self, resource: Resource, id: &str) -> Reply {
        self.get(resource.item_path(id).as_str()).await
    }

    pub async fn create<T: Serialize + ?Sized>(&self, resource: Resource, data: &T) -> Reply {
        self.post(resource.path().as_str(), data).await
    }

    pub async fn update<T: Serialize + ?Sized>(
        &self,
        resource: Resource,
        id: &str,
        data: &T,
    ) -> Reply {
        self.put(resource.item_path(id).as_str(), data).await
    }

    pub async fn delete_one(&self, resource: Resource, id: &str) -> Reply {
        self.delete(resource.item_path(id).as_str()).await
    }
}

/// Named get-one/create/update/delete calls for a resource
macro_rules! resource_calls {
    ($resource:expr, $get:ident, $create:ident, $update:ident, $delete:ident) => {
        impl ApiClient {
            pub async fn $get(&self, id: &str) -> Reply {
                self.get_one($resource, id).await
            }

            pub async fn $create<T: Serialize + ?Sized>(&self, data: &T) -> Reply {
                self.create($resource, data).await
            }

            pub async fn $update<T: Serialize + ?Sized>(&self, id: &str, data: &T) -> Reply {
                self.update($resource, id, data).await
            }

            pub async fn $delete(&self, id: &str) -> Reply {
                self.delete_one($resource, id).await
            }
        }
    };
}

resource_calls!(
    Resource::Courses,
    get_course,
    create_course,
    update_course,
    delete_course
);
resource_calls!(
    Resource::Assignments,
    get_assignment,
    create_assignment,
    update_assignment,
    delete_assignment
);
resource_calls!(
    Resource::Exams,
    get_exam,
    create_exam,
    update_exam,
    delete_exam
);
resource_calls!(
    Resource::Webinars,
    get_webinar,
    create_webinar,
    update_webinar,
    delete_webinar
);
resource_calls!(
    Resource::Students,
    get_student,
    create_student,
    update_student,
    delete_student
);
resource_calls!(
    Resource::Library,
    get_library_document,
    create_library_document,
    update_library_document,
    delete_library_document
);
resource_calls!(
    Resource::Forum,
    get_forum_topic,
    create_forum_topic,
    update_forum_topic,
    delete_forum_topic
);

impl ApiClient {
    pub async fn courses(&self, page: Page) -> Reply {
        self.list(Resource::Courses, page, None).await
    }

    pub async fn assignments(&self, page: Page) -> Reply {
        self.list(Resource::Assignments, page, None).await
    }

    pub async fn exams(&self, page: Page) -> Reply {
        self.list(Resource::Exams, page, None).await
    }

    pub async fn webinars(&self, page: Page) -> Reply {
        self.list(Resource::Webinars, page, None).await
    }

    pub async fn students(&self, page: Page) -> Reply {
        self.list(Resource::Students, page, None).await
    }

    /// Library and forum listings can be narrowed to a category
    pub async fn library_documents(&self, page: Page, category: Option<&str>) -> Reply {
        self.list(Resource::Library, page, category).await
    }

    pub async fn forum_topics(&self, page: Page, category: Option<&str>) -> Reply {
        self.list(Resource::Forum, page, category).await
    }

    /// `fields` is the document metadata: title, category, and so on
    pub async fn upload_document(
        &self,
        file: UploadFile,
        fields: &BTreeMap<String, String>,
    ) -> Reply {
        self.upload_file("/library/upload", file, fields).await
    }

    pub async fn upload_avatar(&self, file: UploadFile) -> Reply {
        self.upload_file("/users/avatar", file, &BTreeMap::new())
            .await
    }

    pub async fn available_avatars(&self) -> Reply {
        self.get("/avatars").await
    }

    pub async fn register<T: Serialize + ?Sized>(&self, user: &T) -> Reply {
        self.post("/register", user).await
    }

    pub async fn statistics(&self) -> Reply {
        self.get("/statistics").await
    }

    pub async fn notifications(&self) -> Reply {
        self.get("/notifications").await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Reply {
        let path = format!("/notifications/{}/read", urlencoding::encode(id));
        self.put_empty(path.as_str()).await
    }

    pub async fn init_sample_data(&self) -> Reply {
        self.post_empty("/init-sample-data").await
    }

    pub async fn health(&self) -> Reply {
        self.get("/health").await
    }
}
