use crate::auth::Role;
use crate::import::ParsedParameter;
use crate::models::{
    Attachment, ContentType, Dictionary, DictionaryListResponse, DictionaryValue, Document,
    DocumentKind, DocumentListResponse, Faq, FaqListResponse, Interface, InterfaceListResponse,
    InterfaceSearch, InterfaceStatus, InterfaceType, LoginRequest, NewDictionary,
    NewDictionaryValue, NewInterface, NewParameter, NewProject, NewUser, ParamType, Parameter,
    Project, ProjectDetail, ProjectDoc, ProjectListResponse, TokenResponse, UpdateDictionary,
    UpdateDocument, UpdateFaq, UpdateInterface, UpdateParameter, UpdateProject, UserInfo,
};
use crate::routes::export::{
    ExportData, ExportDictionary, ExportDictionaryValue, ExportInterface, ExportParameter,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::auth_routes::login,
        crate::routes::auth_routes::register,
        crate::routes::auth_routes::me,
        crate::routes::projects::list_projects,
        crate::routes::projects::create_project,
        crate::routes::projects::get_project,
        crate::routes::projects::update_project,
        crate::routes::projects::delete_project,
        crate::routes::projects::upload_attachment,
        crate::routes::projects::delete_attachment,
        crate::routes::interfaces::list_interfaces,
        crate::routes::interfaces::create_interface,
        crate::routes::interfaces::search_interfaces,
        crate::routes::interfaces::get_interface,
        crate::routes::interfaces::get_interface_by_code,
        crate::routes::interfaces::update_interface,
        crate::routes::interfaces::delete_interface,
        crate::routes::parameters::list_parameters,
        crate::routes::parameters::create_parameter,
        crate::routes::parameters::get_parameter,
        crate::routes::parameters::update_parameter,
        crate::routes::parameters::delete_parameter,
        crate::routes::parameters::batch_parse,
        crate::routes::parameters::batch_import,
        crate::routes::dictionaries::list_dictionaries,
        crate::routes::dictionaries::create_dictionary,
        crate::routes::dictionaries::get_dictionary,
        crate::routes::dictionaries::update_dictionary,
        crate::routes::dictionaries::delete_dictionary,
        crate::routes::dictionaries::add_value,
        crate::routes::dictionaries::delete_value,
        crate::routes::documents::list_documents,
        crate::routes::documents::create_document,
        crate::routes::documents::get_document,
        crate::routes::documents::update_document,
        crate::routes::documents::delete_document,
        crate::routes::documents::upload_attachment,
        crate::routes::documents::delete_attachment,
        crate::routes::faqs::list_faqs,
        crate::routes::faqs::create_faq,
        crate::routes::faqs::get_faq,
        crate::routes::faqs::update_faq,
        crate::routes::faqs::delete_faq,
        crate::routes::faqs::upload_attachment,
        crate::routes::faqs::delete_attachment,
        crate::routes::export::export_json,
    ),
    components(schemas(
        InterfaceType, InterfaceStatus, ParamType, DocumentKind, ContentType, Role,
        Attachment, ProjectDoc,
        Project, NewProject, UpdateProject, ProjectDetail, ProjectListResponse,
        Interface, NewInterface, UpdateInterface, InterfaceSearch, InterfaceListResponse,
        Parameter, NewParameter, UpdateParameter, ParsedParameter,
        Dictionary, NewDictionary, UpdateDictionary, DictionaryValue, NewDictionaryValue,
        DictionaryListResponse,
        Document, UpdateDocument, DocumentListResponse,
        Faq, UpdateFaq, FaqListResponse,
        LoginRequest, NewUser, UserInfo, TokenResponse,
        ExportData, ExportInterface, ExportParameter, ExportDictionary, ExportDictionaryValue,
        crate::routes::parameters::BatchParseRequest,
        crate::routes::parameters::BatchImportRequest,
    )),
    tags(
        (name = "projects", description = "Project catalogue operations"),
        (name = "interfaces", description = "HIS interface operations"),
        (name = "parameters", description = "Interface parameter operations, including batch import"),
        (name = "dictionaries", description = "Reference dictionary operations"),
        (name = "documents", description = "Document/screenshot operations"),
        (name = "faqs", description = "FAQ operations"),
    )
)]
pub struct ApiDoc;
