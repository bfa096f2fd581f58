//! The course catalog and the two keyword lookup tools over it.

use async_trait::async_trait;
use serde_json::{json, Value};

use react_engine::{Document, EngineError, Tool};

pub struct Course {
    pub key: &'static str,
    pub name: &'static str,
    pub topic: &'static str,
    pub students: u32,
    pub content: &'static str,
}

pub const COURSES: [Course; 4] = [
    Course {
        key: "flutter",
        name: "Flutter",
        topic: "Mobile Development",
        students: 150,
        content: "Flutter is a cross-platform mobile development framework created by Google. It uses Dart programming language and allows building apps for iOS, Android, and web from a single codebase. Flutter has hot reload, rich widgets, and excellent performance.",
    },
    Course {
        key: "kotlin",
        name: "Kotlin",
        topic: "Android Development",
        students: 120,
        content: "Kotlin is a modern programming language for Android development. It's officially supported by Google and offers null safety, coroutines, and concise syntax. Kotlin is 100% interoperable with Java.",
    },
    Course {
        key: "langchain",
        name: "LangChain",
        topic: "AI Development",
        students: 80,
        content: "LangChain is a framework for developing applications powered by language models. It provides tools for chains, agents, memory management, and RAG (Retrieval Augmented Generation).",
    },
    Course {
        key: "ai",
        name: "AI/ML",
        topic: "Artificial Intelligence",
        students: 200,
        content: "AI and Machine Learning courses cover neural networks, deep learning, and practical applications using Python and TensorFlow. Topics include supervised learning, unsupervised learning, and reinforcement learning.",
    },
];

const PLATFORM_INFO: &str = "Ruby Learner offers tech courses in Burmese language, making education accessible to Myanmar learners who want to learn Flutter, Kotlin, and AI technologies.";

/// Every course plus the platform overview, ready to embed.
pub fn documents() -> Vec<Document> {
    let mut docs: Vec<Document> = COURSES
        .iter()
        .map(|c| {
            Document::new(c.key, c.content).with_metadata(json!({
                "course": c.name,
                "topic": c.topic,
                "students": c.students,
            }))
        })
        .collect();
    docs.push(Document::new("general", PLATFORM_INFO).with_metadata(json!({
        "course": "General",
        "topic": "Platform Info",
        "students": 550,
    })));
    docs
}

/// A vector hit as the model sees it: course header from the metadata, then the text.
pub fn render_hit(document: &Document) -> String {
    let meta = &document.metadata;
    format!(
        "**{}** (Topic: {}, Students: {})\n{}",
        meta["course"].as_str().unwrap_or("Unknown"),
        meta["topic"].as_str().unwrap_or("N/A"),
        meta["students"].as_u64().unwrap_or(0),
        document.text
    )
}

fn string_arg<'a>(input: &'a Value, key: &str, tool: &str) -> react_engine::Result<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Protocol(format!("`{tool}` expects a string `{key}` argument")))
}

fn matches_query(course: &Course, query: &str) -> bool {
    let name = course.name.to_lowercase();
    let topic = course.topic.to_lowercase();
    query.contains(course.key)
        || query.contains(&name)
        || query.split_whitespace().any(|term| topic.contains(term))
}

pub struct SearchCourses;

#[async_trait]
impl Tool for SearchCourses {
    fn name(&self) -> &str {
        "search_courses"
    }

    fn description(&self) -> &str {
        "Search ALL courses from the knowledge base that match the query. Always use this to get course information."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        }))
    }

    async fn call(&self, input: Value) -> react_engine::Result<Value> {
        let query = string_arg(&input, "query", self.name())?.to_lowercase();
        let hits: Vec<String> = COURSES
            .iter()
            .filter(|c| matches_query(c, &query))
            .map(|c| {
                format!(
                    "**{}** (Topic: {}, Students: {})\n{}",
                    c.name, c.topic, c.students, c.content
                )
            })
            .collect();

        if hits.is_empty() {
            return Ok(Value::String(
                "No courses found matching your query. Available courses: Flutter, Kotlin, LangChain, AI/ML".into(),
            ));
        }
        Ok(Value::String(hits.join("\n\n")))
    }
}

pub struct CourseDetails;

#[async_trait]
impl Tool for CourseDetails {
    fn name(&self) -> &str {
        "get_course_details"
    }

    fn description(&self) -> &str {
        "Get detailed information including student count for a specific course"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {"course_name": {"type": "string"}},
            "required": ["course_name"]
        }))
    }

    async fn call(&self, input: Value) -> react_engine::Result<Value> {
        let wanted = string_arg(&input, "course_name", self.name())?.to_lowercase();
        let found = COURSES
            .iter()
            .find(|c| wanted.contains(c.key) || wanted.contains(&c.name.to_lowercase()));

        let text = match found {
            Some(c) => format!(
                "Course: {}\nTopic: {}\nEnrolled Students: {}\n\nDescription: {}",
                c.name, c.topic, c.students, c.content
            ),
            None => "Course not found in knowledge base.".to_string(),
        };
        Ok(Value::String(text))
    }
}
